use shared::client::{CachedMessage, DeliveryStatus};
use shared::models::{MessageKind, MessageView};
use uuid::Uuid;
use yew::{Callback, Html, Properties, ToHtml, classes, function_component, html};

#[derive(Properties, PartialEq, Clone)]
pub struct MessageListProps {
    /// Oldest first.
    pub messages: Vec<CachedMessage>,
    pub me: Uuid,
    /// Resend a failed local message, by id.
    pub on_resend: Callback<Uuid>,
}

const fn bubble_classes(own: bool) -> &'static str {
    if own {
        "bg-primary text-primary-content"
    } else {
        "bg-base-200 text-base-content"
    }
}

fn body(message: &MessageView) -> Html {
    match message.kind {
        MessageKind::Text => html! { <span class="whitespace-pre-wrap break-words">{ message.content.clone() }</span> },
        MessageKind::Image => html! {
            <img class="max-w-xs rounded" src={message.content.clone()} alt="image" loading="lazy" />
        },
        MessageKind::Video => html! {
            <video class="max-w-xs rounded" src={message.content.clone()} controls=true />
        },
        MessageKind::Call => html! {
            <span class="italic">{ format!("Call {}", message.content) }</span>
        },
    }
}

#[derive(Properties, PartialEq, Clone)]
struct MessageItemProps {
    entry: CachedMessage,
    own: bool,
    on_resend: Callback<Uuid>,
}

#[function_component(MessageItem)]
fn message_item(props: &MessageItemProps) -> Html {
    let message = &props.entry.message;
    let row = if props.own {
        classes!("flex", "flex-col", "items-end")
    } else {
        classes!("flex", "flex-col", "items-start")
    };
    let mut bubble = classes!("rounded-xl", "px-4", "py-2", "shadow-sm", "max-w-[75%]", bubble_classes(props.own));
    if props.entry.status == DeliveryStatus::Pending {
        bubble.push("opacity-60");
    }

    let status = match &props.entry.status {
        DeliveryStatus::Sent => html! {},
        DeliveryStatus::Pending => html! { <span>{"Sending…"}</span> },
        DeliveryStatus::Failed { reason } => {
            let id = message.id;
            let on_resend = props.on_resend.clone();
            html! {
                <span class="text-error">
                    { format!("Not sent: {reason}") }
                    <button class="btn btn-ghost btn-xs ml-1" type="button" onclick={Callback::from(move |_| on_resend.emit(id))}>
                        {"Retry"}
                    </button>
                </span>
            }
        }
    };

    html! {
        <div class={row}>
            <div class="flex items-center gap-2 text-xs text-base-content/70 mb-1">
                if !props.own {
                    <span class="font-semibold">{ message.sender.display_name.clone() }</span>
                }
                <span>{ message.created_at.to_html() }</span>
            </div>
            <div class={bubble}>{ body(message) }</div>
            <div class="text-xs mt-1">{ status }</div>
        </div>
    }
}

#[function_component(MessageList)]
pub fn message_list(props: &MessageListProps) -> Html {
    if props.messages.is_empty() {
        return html! {
            <div class="p-4 text-sm text-base-content/70 text-center">
                {"No messages yet. Say hello!"}
            </div>
        };
    }

    html! {
        <div class="space-y-3">
            { for props.messages.iter().map(|entry| html! {
                <MessageItem
                    key={entry.id().to_string()}
                    entry={entry.clone()}
                    own={entry.message.sender.id == props.me}
                    on_resend={props.on_resend.clone()}
                />
            })}
        </div>
    }
}
