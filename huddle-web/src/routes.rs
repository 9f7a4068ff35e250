use crate::{
    api::HuddleClient,
    pages::{ChatPage, ConversationsPage, ErrorPage},
};
use shared::models::SenderProfile;
use uuid::Uuid;
use yew::prelude::*;
use yew_router::prelude::*;

/// The main routes
#[derive(Debug, Clone, PartialEq, Routable)]
pub enum MainRoute {
    #[at("/")]
    Home,
    #[at("/c/:conversation_id")]
    Conversation { conversation_id: String },
    #[not_found]
    #[at("/404")]
    NotFound,
}

impl MainRoute {
    pub fn conversation(id: Uuid) -> Self {
        Self::Conversation {
            conversation_id: id.to_string(),
        }
    }
}

/// Everything a routed page needs from the signed-in shell.
#[derive(Clone, PartialEq)]
pub struct Session {
    pub client: HuddleClient,
    pub me: SenderProfile,
}

#[derive(Properties, PartialEq)]
pub struct MainRouteViewProps {
    pub route: MainRoute,
    pub session: Session,
    pub on_sign_out: Callback<()>,
}

#[function_component(MainRouteView)]
fn main_route_view(props: &MainRouteViewProps) -> Html {
    let session = props.session.clone();
    let selected = match &props.route {
        MainRoute::Conversation { conversation_id } => Uuid::parse_str(conversation_id).ok(),
        _ => None,
    };

    let content = match &props.route {
        MainRoute::Home => html! {
            <div class="flex-1 flex items-center justify-center text-base-content/60">
                {"Pick a conversation or start a new one."}
            </div>
        },
        MainRoute::Conversation { .. } => match selected {
            Some(conversation_id) => html! {
                <ChatPage
                    key={conversation_id.to_string()}
                    client={session.client.clone()}
                    me={session.me.clone()}
                    {conversation_id}
                />
            },
            None => html! { <ErrorPage message={"That conversation link is not valid."} /> },
        },
        MainRoute::NotFound => html! { <ErrorPage message={"Page not found."} /> },
    };

    html! {
        <div class="h-screen flex">
            <ConversationsPage
                client={session.client}
                me={session.me}
                {selected}
                on_sign_out={props.on_sign_out.clone()}
            />
            <main class="flex-1 flex flex-col min-w-0">{ content }</main>
        </div>
    }
}

/// Switch function for the main routes.
pub fn switch(route: MainRoute, session: Session, on_sign_out: Callback<()>) -> Html {
    web_sys::console::debug_1(&format!("Switching to route: {route:?}").into());
    html! { <MainRouteView {route} {session} {on_sign_out} /> }
}
