use uuid::Uuid;
use web_sys::HtmlInputElement;
use yew::{Callback, Html, Properties, TargetCast, function_component, html, use_state};

#[derive(Properties, PartialEq)]
pub struct IdentityPageProps {
    pub on_submit: Callback<Uuid>,
}

/// Asks which user this browser acts as. Accounts are managed outside Huddle.
#[function_component(IdentityPage)]
pub fn identity_page(props: &IdentityPageProps) -> Html {
    let value = use_state(String::new);
    let error = use_state(|| None::<String>);

    let on_input = {
        let value = value.clone();
        Callback::from(move |event: yew::events::InputEvent| {
            let target: HtmlInputElement = event.target_unchecked_into();
            value.set(target.value());
        })
    };

    let on_submit = {
        let value = value.clone();
        let error = error.clone();
        let on_submit = props.on_submit.clone();
        Callback::from(move |event: yew::events::SubmitEvent| {
            event.prevent_default();
            match Uuid::parse_str(value.trim()) {
                Ok(user_id) => {
                    error.set(None);
                    on_submit.emit(user_id);
                }
                Err(_) => error.set(Some("Enter a valid user id (UUID)".to_string())),
            }
        })
    };

    html! {
        <div class="min-h-screen flex items-center justify-center bg-base-200">
            <form class="card bg-base-100 shadow-md w-full max-w-md" onsubmit={on_submit}>
                <div class="card-body space-y-3">
                    <h1 class="card-title">{"Huddle"}</h1>
                    <p class="text-sm text-base-content/70">{"Enter your user id to start chatting."}</p>
                    <input
                        class="input input-bordered w-full font-mono"
                        type="text"
                        placeholder="00000000-0000-0000-0000-000000000000"
                        value={(*value).clone()}
                        oninput={on_input}
                    />
                    {
                        (*error).clone().map_or_else(
                            || html! {},
                            |message| html! { <div class="text-error text-sm">{ message }</div> },
                        )
                    }
                    <button class="btn btn-primary" type="submit" disabled={value.trim().is_empty()}>
                        {"Continue"}
                    </button>
                </div>
            </form>
        </div>
    }
}
