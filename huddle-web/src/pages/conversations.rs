use crate::api::HuddleClient;
use crate::app::display_name;
use crate::components::ConversationList;
use crate::routes::MainRoute;
use gloo_timers::callback::Interval;
use shared::models::{Conversation, SenderProfile};
use uuid::Uuid;
use wasm_bindgen_futures::spawn_local;
use web_sys::HtmlInputElement;
use yew::{
    Callback, Html, Properties, TargetCast, UseStateHandle, function_component, html,
    use_effect_with, use_state,
};
use yew_router::prelude::use_navigator;

/// Conversation ordering changes whenever someone posts, so the list is refreshed periodically.
const REFRESH_INTERVAL_MS: u32 = 15_000;

#[derive(Properties, PartialEq)]
pub struct ConversationsPageProps {
    pub client: HuddleClient,
    pub me: SenderProfile,
    #[prop_or(None)]
    pub selected: Option<Uuid>,
    pub on_sign_out: Callback<()>,
}

fn refresh(
    client: HuddleClient,
    conversations: UseStateHandle<Vec<Conversation>>,
    error: UseStateHandle<Option<String>>,
) {
    spawn_local(async move {
        match client.conversations().await {
            Ok(list) => {
                conversations.set(list);
                error.set(None);
            }
            Err(err) => error.set(Some(format!("Failed to load conversations: {err}"))),
        }
    });
}

#[function_component(ConversationsPage)]
pub fn conversations_page(props: &ConversationsPageProps) -> Html {
    let conversations = use_state(Vec::<Conversation>::new);
    let error = use_state(|| None::<String>);
    let peer_input = use_state(String::new);
    let navigator = use_navigator();

    {
        let client = props.client.clone();
        let conversations = conversations.clone();
        let error = error.clone();
        use_effect_with((props.client.clone(), props.selected), move |_| {
            refresh(client.clone(), conversations.clone(), error.clone());
            let interval = Interval::new(REFRESH_INTERVAL_MS, move || {
                refresh(client.clone(), conversations.clone(), error.clone());
            });
            move || drop(interval)
        });
    }

    let on_select = {
        let navigator = navigator.clone();
        Callback::from(move |id: Uuid| {
            if let Some(navigator) = &navigator {
                navigator.push(&MainRoute::conversation(id));
            }
        })
    };

    let on_peer_input = {
        let peer_input = peer_input.clone();
        Callback::from(move |event: yew::events::InputEvent| {
            let target: HtmlInputElement = event.target_unchecked_into();
            peer_input.set(target.value());
        })
    };

    let on_open = {
        let client = props.client.clone();
        let peer_input = peer_input.clone();
        let error = error.clone();
        let conversations = conversations.clone();
        Callback::from(move |event: yew::events::SubmitEvent| {
            event.prevent_default();
            let Ok(peer) = Uuid::parse_str(peer_input.trim()) else {
                error.set(Some("Enter the other person's user id".to_string()));
                return;
            };
            let client = client.clone();
            let peer_input = peer_input.clone();
            let error = error.clone();
            let conversations = conversations.clone();
            let navigator = navigator.clone();
            spawn_local(async move {
                match client.open_personal(peer).await {
                    Ok(conversation) => {
                        peer_input.set(String::new());
                        conversations.set({
                            let mut next = (*conversations).clone();
                            next.retain(|item| item.id != conversation.id);
                            next.insert(0, conversation.clone());
                            next
                        });
                        if let Some(navigator) = &navigator {
                            navigator.push(&MainRoute::conversation(conversation.id));
                        }
                    }
                    Err(err) => error.set(Some(format!("Could not open conversation: {err}"))),
                }
            });
        })
    };

    let on_sign_out = props.on_sign_out.reform(|_: yew::MouseEvent| ());

    html! {
        <aside class="w-full md:w-80 border-r border-base-300 flex flex-col">
            <div class="flex items-center justify-between p-3 border-b border-base-300">
                <h2 class="font-semibold truncate">{ display_name(&props.me) }</h2>
                <button class="btn btn-sm btn-ghost" type="button" onclick={on_sign_out}>{"Switch user"}</button>
            </div>
            {
                (*error).clone().map_or_else(
                    || html! {},
                    |error| html! { <div class="alert alert-error rounded-none text-sm">{ error }</div> },
                )
            }
            <div class="flex-1 overflow-y-auto">
                <ConversationList
                    conversations={(*conversations).clone()}
                    me={props.me.id}
                    selected={props.selected}
                    {on_select}
                />
            </div>
            <form class="p-3 border-t border-base-300 flex gap-2" onsubmit={on_open}>
                <input
                    class="input input-bordered input-sm flex-1 font-mono"
                    type="text"
                    placeholder="User id"
                    value={(*peer_input).clone()}
                    oninput={on_peer_input}
                />
                <button class="btn btn-sm btn-primary" type="submit" disabled={peer_input.trim().is_empty()}>
                    {"Chat"}
                </button>
            </form>
        </aside>
    }
}
