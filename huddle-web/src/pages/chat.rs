use std::{
    cell::RefCell,
    rc::Rc,
};

use crate::api::HuddleClient;
use crate::components::{Composer, MessageList};
use serde_json::from_str;
use shared::client::{
    ChatAction, ChatState, LoadPhase, RetryPolicy, ScrollAdjustment, ScrollSnapshot,
    adjustment_for, with_retry,
};
use shared::models::{
    ChatStreamEvent, DEFAULT_PAGE_SIZE, MessageKind, MessageView, SendMessageRequest,
    SenderProfile, Timestamp,
};
use uuid::Uuid;
use wasm_bindgen::{JsCast, closure::Closure};
use wasm_bindgen_futures::spawn_local;
use web_sys::{Element, Event, EventSource, MessageEvent};
use yew::{
    Callback, Html, Properties, Reducible, UseReducerDispatcher, function_component,
    html, use_effect_with, use_mut_ref, use_node_ref, use_reducer, use_state,
};

/// Distance from the top, in pixels, at which older history is requested.
const LOAD_OLDER_THRESHOLD_PX: i32 = 48;

/// Yew wrapper around the shared reducer. `revision` changes on every dispatch so effects can
/// react to each applied action exactly once.
#[derive(Clone)]
struct ChatStore {
    state: ChatState,
    revision: u64,
}

impl Reducible for ChatStore {
    type Action = ChatAction;

    fn reduce(self: Rc<Self>, action: Self::Action) -> Rc<Self> {
        let mut next = Rc::unwrap_or_clone(self);
        // Follow-up fetches surface through `pending_request`.
        let _ = next.state.apply(action);
        next.revision += 1;
        Rc::new(next)
    }
}

#[derive(Properties, PartialEq)]
pub struct ChatPageProps {
    pub client: HuddleClient,
    pub me: SenderProfile,
    pub conversation_id: Uuid,
}

type ListenerRegistry = Rc<RefCell<Vec<Closure<dyn FnMut(Event)>>>>;

fn listen(
    event_source: &EventSource,
    name: &str,
    listeners: &ListenerRegistry,
    handler: impl FnMut(Event) + 'static,
) {
    let listener = Closure::<dyn FnMut(Event)>::wrap(Box::new(handler));
    if let Err(err) =
        event_source.add_event_listener_with_callback(name, listener.as_ref().unchecked_ref())
    {
        web_sys::console::error_2(&format!("Could not listen for {name}:").into(), &err);
        return;
    }
    listeners.borrow_mut().push(listener);
}

fn stream_event(event: &Event) -> Option<ChatStreamEvent> {
    let data = event.dyn_ref::<MessageEvent>()?.data().as_string()?;
    match from_str(&data) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            web_sys::console::warn_1(&format!("Ignoring malformed stream event: {err}").into());
            None
        }
    }
}

fn register_stream_listeners(
    event_source: &EventSource,
    client: &HuddleClient,
    conversation_id: Uuid,
    listeners: &ListenerRegistry,
    dispatcher: &UseReducerDispatcher<ChatStore>,
    stream_error: &yew::UseStateHandle<Option<String>>,
) {
    // connection.ready
    {
        let client = client.clone();
        let dispatcher = dispatcher.clone();
        let stream_error = stream_error.clone();
        listen(event_source, "connection.ready", listeners, move |event| {
            let Some(ChatStreamEvent::ConnectionReady { payload }) = stream_event(&event) else {
                return;
            };
            let client = client.clone();
            let dispatcher = dispatcher.clone();
            let stream_error = stream_error.clone();
            spawn_local(async move {
                match client.join(payload.connection_id, conversation_id).await {
                    Ok(_) => {
                        stream_error.set(None);
                        // Anything sent before the join only shows up through history.
                        dispatcher.dispatch(ChatAction::Reconnected);
                    }
                    Err(err) => {
                        stream_error.set(Some(format!("Live updates unavailable: {err}")));
                    }
                }
            });
        });
    }

    // message.new
    {
        let dispatcher = dispatcher.clone();
        listen(event_source, "message.new", listeners, move |event| {
            if let Some(ChatStreamEvent::MessageNew { payload }) = stream_event(&event) {
                dispatcher.dispatch(ChatAction::Pushed {
                    message: payload.message,
                });
            }
        });
    }

    // Server error events and transport failures share the name; only the former carry data.
    {
        let stream_error = stream_error.clone();
        listen(event_source, "error", listeners, move |event| {
            match stream_event(&event) {
                Some(ChatStreamEvent::Error { payload }) => {
                    stream_error.set(Some(format!(
                        "Stream error {}: {}",
                        payload.code, payload.message
                    )));
                }
                Some(_) => {}
                None => stream_error.set(Some("Reconnecting…".to_string())),
            }
        });
    }
}

fn snapshot_of(element: &Element) -> ScrollSnapshot {
    ScrollSnapshot {
        scroll_top: f64::from(element.scroll_top()),
        scroll_height: f64::from(element.scroll_height()),
        client_height: f64::from(element.client_height()),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn apply_scroll(element: &Element, adjustment: ScrollAdjustment) {
    match adjustment {
        ScrollAdjustment::Keep => {}
        ScrollAdjustment::ScrollTo(top) => element.set_scroll_top(top.round() as i32),
        ScrollAdjustment::ToBottom => element.set_scroll_top(element.scroll_height()),
    }
}

async fn deliver(
    client: HuddleClient,
    dispatcher: UseReducerDispatcher<ChatStore>,
    message: MessageView,
) {
    let request = SendMessageRequest {
        kind: message.kind,
        content: message.content.clone(),
        message_id: Some(message.id),
    };
    match client.send(message.conversation_id, &request).await {
        Ok(stored) => dispatcher.dispatch(ChatAction::SendConfirmed { message: stored }),
        Err(err) => dispatcher.dispatch(ChatAction::SendFailed {
            message_id: message.id,
            reason: err.to_string(),
        }),
    }
}

#[function_component(ChatPage)]
pub fn chat_page(props: &ChatPageProps) -> Html {
    let me = props.me.id;
    let store = use_reducer(move || ChatStore {
        state: ChatState::new(me, DEFAULT_PAGE_SIZE),
        revision: 0,
    });
    let stream_error = use_state(|| None::<String>);
    let list_ref = use_node_ref();
    let snapshot = use_mut_ref(ScrollSnapshot::default);

    // Open the conversation; closing bumps the epoch so late pages are dropped.
    {
        let dispatcher = store.dispatcher();
        use_effect_with(props.conversation_id, move |conversation_id| {
            dispatcher.dispatch(ChatAction::Open {
                conversation_id: *conversation_id,
            });
            move || dispatcher.dispatch(ChatAction::Close)
        });
    }

    // Run whichever history fetch the reducer issued last.
    {
        let client = props.client.clone();
        let dispatcher = store.dispatcher();
        use_effect_with(store.state.pending_request().cloned(), move |request| {
            if let Some(request) = request.clone() {
                spawn_local(async move {
                    let result = with_retry(
                        RetryPolicy::default(),
                        |_| {
                            let client = client.clone();
                            let query = request.query.clone();
                            let conversation_id = request.conversation_id;
                            async move { client.history(conversation_id, &query).await }
                        },
                        gloo_timers::future::sleep,
                    )
                    .await;
                    dispatcher.dispatch(match result {
                        Ok(messages) => request.loaded(messages),
                        Err(err) => request.failed(err.to_string()),
                    });
                });
            }
            || ()
        });
    }

    // Subscribe to live updates for this conversation.
    {
        let client = props.client.clone();
        let dispatcher = store.dispatcher();
        let stream_error = stream_error.clone();
        use_effect_with(props.conversation_id, move |conversation_id| {
            let mut cleanup: Option<(EventSource, ListenerRegistry)> = None;
            match EventSource::new(&client.stream_url()) {
                Ok(event_source) => {
                    let listeners: ListenerRegistry = Rc::new(RefCell::new(Vec::new()));
                    register_stream_listeners(
                        &event_source,
                        &client,
                        *conversation_id,
                        &listeners,
                        &dispatcher,
                        &stream_error,
                    );
                    cleanup = Some((event_source, listeners));
                }
                Err(err) => {
                    web_sys::console::error_2(&"Could not open event stream:".into(), &err);
                    stream_error.set(Some("Live updates unavailable".to_string()));
                }
            }

            move || {
                if let Some((event_source, listeners)) = cleanup {
                    event_source.close();
                    listeners.borrow_mut().clear();
                }
            }
        });
    }

    // Keep the reading position stable after each applied action.
    {
        let list_ref = list_ref.clone();
        let snapshot = snapshot.clone();
        let change = store.state.last_change();
        let wants_more = *store.state.phase() == LoadPhase::Ready && store.state.has_more();
        let dispatcher = store.dispatcher();
        use_effect_with(store.revision, move |_| {
            if let Some(element) = list_ref.cast::<Element>() {
                let before = *snapshot.borrow();
                let adjustment = adjustment_for(change, before, f64::from(element.scroll_height()));
                apply_scroll(&element, adjustment);
                let after = snapshot_of(&element);
                *snapshot.borrow_mut() = after;
                // Nothing to scroll yet, so scrolling up can never ask for more.
                if wants_more && after.scroll_height <= after.client_height {
                    dispatcher.dispatch(ChatAction::OlderRequested);
                }
            }
            || ()
        });
    }

    let on_scroll = {
        let list_ref = list_ref.clone();
        let snapshot = snapshot.clone();
        let wants_more = *store.state.phase() == LoadPhase::Ready && store.state.has_more();
        let dispatcher = store.dispatcher();
        Callback::from(move |_: Event| {
            if let Some(element) = list_ref.cast::<Element>() {
                *snapshot.borrow_mut() = snapshot_of(&element);
                if wants_more && element.scroll_top() <= LOAD_OLDER_THRESHOLD_PX {
                    dispatcher.dispatch(ChatAction::OlderRequested);
                }
            }
        })
    };

    let on_submit = {
        let client = props.client.clone();
        let sender = props.me.clone();
        let conversation_id = props.conversation_id;
        let dispatcher = store.dispatcher();
        Callback::from(move |content: String| {
            let message = MessageView {
                id: Uuid::new_v4(),
                conversation_id,
                sender: sender.clone(),
                kind: MessageKind::Text,
                content,
                created_at: Timestamp::now(),
            };
            dispatcher.dispatch(ChatAction::OptimisticSend {
                message: message.clone(),
            });
            spawn_local(deliver(client.clone(), dispatcher.clone(), message));
        })
    };

    let on_resend = {
        let client = props.client.clone();
        let dispatcher = store.dispatcher();
        let messages = store.state.messages();
        Callback::from(move |message_id: Uuid| {
            let Some(entry) = messages.iter().find(|entry| entry.id() == message_id) else {
                return;
            };
            dispatcher.dispatch(ChatAction::Resend { message_id });
            spawn_local(deliver(
                client.clone(),
                dispatcher.clone(),
                entry.message.clone(),
            ));
        })
    };

    let on_retry = {
        let dispatcher = store.dispatcher();
        Callback::from(move |_: yew::MouseEvent| dispatcher.dispatch(ChatAction::Retry))
    };

    let header = match store.state.phase() {
        LoadPhase::LoadingFirst | LoadPhase::Idle => html! {
            <div class="text-center text-sm text-base-content/60 py-2">{"Loading messages…"}</div>
        },
        LoadPhase::LoadingOlder => html! {
            <div class="text-center text-sm text-base-content/60 py-2">{"Loading earlier messages…"}</div>
        },
        LoadPhase::Error { message, .. } => html! {
            <div class="alert alert-error my-2">
                <span>{ format!("Could not load messages: {message}") }</span>
                <button class="btn btn-sm" type="button" onclick={on_retry}>{"Retry"}</button>
            </div>
        },
        LoadPhase::Ready if !store.state.has_more() => html! {
            <div class="text-center text-xs text-base-content/50 py-2">{"Beginning of conversation"}</div>
        },
        LoadPhase::Ready => html! {},
    };

    html! {
        <div class="flex-1 flex flex-col min-h-0">
            {
                (*stream_error).clone().map_or_else(
                    || html! {},
                    |error| html! { <div class="alert alert-warning rounded-none text-sm">{ error }</div> },
                )
            }
            <div class="flex-1 overflow-y-auto p-4" ref={list_ref} onscroll={on_scroll}>
                { header }
                <MessageList messages={store.state.messages()} {me} {on_resend} />
            </div>
            <div class="border-t border-base-300 p-4 bg-base-200">
                <Composer on_send={on_submit} />
            </div>
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_counts_every_dispatch() {
        let me = Uuid::new_v4();
        let store = Rc::new(ChatStore {
            state: ChatState::new(me, DEFAULT_PAGE_SIZE),
            revision: 0,
        });
        let conversation_id = Uuid::new_v4();

        let opened = store.reduce(ChatAction::Open { conversation_id });
        assert_eq!(opened.revision, 1);
        assert_eq!(opened.state.conversation_id(), Some(conversation_id));
        assert!(opened.state.pending_request().is_some());

        // Ignored actions still count, so the scroll effect sees them as settled.
        let ignored = opened.reduce(ChatAction::OlderRequested);
        assert_eq!(ignored.revision, 2);
        assert_eq!(ignored.state.phase(), &LoadPhase::LoadingFirst);
    }
}
