use shared::models::DEFAULT_MAX_TEXT_LENGTH;
use web_sys::HtmlTextAreaElement;
use yew::events::{InputEvent, KeyboardEvent, SubmitEvent};
use yew::{
    AttrValue, Callback, Html, Properties, TargetCast, classes, function_component, html,
    use_state,
};

/// Whether the current draft can be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Draft {
    Empty,
    Sendable,
    /// Characters over the limit.
    TooLong(usize),
}

impl Draft {
    /// Length is counted in characters after trimming, the same way the server counts it.
    pub fn check(text: &str, limit: usize) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }
        let length = trimmed.chars().count();
        if length > limit {
            Self::TooLong(length - limit)
        } else {
            Self::Sendable
        }
    }
}

#[derive(Properties, PartialEq, Clone)]
pub struct ComposerProps {
    /// Receives the trimmed text; the draft is cleared afterwards.
    pub on_send: Callback<String>,
    #[prop_or(DEFAULT_MAX_TEXT_LENGTH)]
    pub max_length: usize,
    #[prop_or(AttrValue::Static("Write a message"))]
    pub placeholder: AttrValue,
}

#[function_component(Composer)]
pub fn composer(props: &ComposerProps) -> Html {
    let draft = use_state(String::new);
    let status = Draft::check(&draft, props.max_length);

    let send = {
        let draft = draft.clone();
        let on_send = props.on_send.clone();
        let limit = props.max_length;
        Callback::from(move |()| {
            if Draft::check(&draft, limit) == Draft::Sendable {
                on_send.emit(draft.trim().to_string());
                draft.set(String::new());
            }
        })
    };

    let oninput = {
        let draft = draft.clone();
        Callback::from(move |event: InputEvent| {
            draft.set(event.target_unchecked_into::<HtmlTextAreaElement>().value());
        })
    };

    // Enter sends, Shift+Enter inserts a newline.
    let onkeydown = {
        let send = send.clone();
        Callback::from(move |event: KeyboardEvent| {
            if event.key() == "Enter" && !event.shift_key() && !event.is_composing() {
                event.prevent_default();
                send.emit(());
            }
        })
    };

    let onsubmit = Callback::from(move |event: SubmitEvent| {
        event.prevent_default();
        send.emit(());
    });

    let hint = match status {
        Draft::TooLong(over) => html! {
            <span class="text-xs text-error">{ format!("{over} characters over the limit") }</span>
        },
        Draft::Empty | Draft::Sendable => html! {},
    };

    html! {
        <form class="flex flex-col gap-1" {onsubmit}>
            <div class="flex items-end gap-3">
                <textarea
                    class={classes!(
                        "textarea", "textarea-bordered", "flex-1", "min-h-[3rem]",
                        matches!(status, Draft::TooLong(_)).then_some("textarea-error"),
                    )}
                    rows="1"
                    placeholder={props.placeholder.clone()}
                    value={(*draft).clone()}
                    {oninput}
                    {onkeydown}
                />
                <button class="btn btn-primary" type="submit" disabled={status != Draft::Sendable}>
                    {"Send"}
                </button>
            </div>
            { hint }
        </form>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_only_drafts_are_empty() {
        assert_eq!(Draft::check("  \n\t", 10), Draft::Empty);
    }

    #[test]
    fn limit_counts_characters_not_bytes() {
        assert_eq!(Draft::check("héllo", 5), Draft::Sendable);
        assert_eq!(Draft::check("  héllo!  ", 5), Draft::TooLong(1));
    }
}
