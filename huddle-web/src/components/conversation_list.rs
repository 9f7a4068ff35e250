use shared::models::Conversation;
use uuid::Uuid;
use yew::{Callback, Html, Properties, classes, function_component, html};

#[derive(Properties, PartialEq)]
pub struct ConversationListProps {
    /// Already sorted, most recently active first.
    pub conversations: Vec<Conversation>,
    pub me: Uuid,
    #[prop_or(None)]
    pub selected: Option<Uuid>,
    pub on_select: Callback<Uuid>,
}

/// Short label for a conversation as seen by `me`.
pub fn conversation_title(conversation: &Conversation, me: Uuid) -> String {
    if let Some(name) = conversation.name.as_deref().filter(|name| !name.trim().is_empty()) {
        return name.to_string();
    }
    match conversation.peer_of(me) {
        Some(peer) => format!("Chat with {}", short_id(peer)),
        None if conversation.is_group => {
            format!("Group of {}", conversation.participants.len())
        }
        None => "Notes to self".to_string(),
    }
}

fn short_id(id: Uuid) -> String {
    id.simple().to_string().chars().take(8).collect()
}

#[function_component(ConversationList)]
pub fn conversation_list(props: &ConversationListProps) -> Html {
    if props.conversations.is_empty() {
        return html! {
            <div class="p-4 text-sm text-base-content/70">
                {"No conversations yet. Start one with a user id below."}
            </div>
        };
    }

    html! {
        <ul class="divide-y divide-base-300">
            { for props.conversations.iter().map(|conversation| {
                let id = conversation.id;
                let is_selected = props.selected == Some(id);
                let on_select = props.on_select.clone();
                let class = if is_selected {
                    classes!("p-3", "bg-base-300", "cursor-pointer")
                } else {
                    classes!("p-3", "hover:bg-base-200", "cursor-pointer")
                };
                html! {
                    <li class={class} onclick={Callback::from(move |_| on_select.emit(id))}>
                        <div class="text-sm font-medium text-base-content truncate">
                            { conversation_title(conversation, props.me) }
                        </div>
                        <div class="text-xs text-base-content/70 mt-1">
                            { format!("Active {}", conversation.last_activity_at.0.format("%Y-%m-%d %H:%M")) }
                        </div>
                    </li>
                }
            })}
        </ul>
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::Timestamp;

    fn conversation(participants: Vec<Uuid>, is_group: bool, name: Option<&str>) -> Conversation {
        Conversation {
            id: Uuid::new_v4(),
            participants,
            is_group,
            name: name.map(str::to_string),
            created_at: Timestamp::now(),
            last_activity_at: Timestamp::now(),
        }
    }

    #[test]
    fn personal_titles_name_the_peer() {
        let me = Uuid::new_v4();
        let peer = Uuid::parse_str("0123abcd-0000-0000-0000-000000000000").unwrap();
        let personal = conversation(vec![me, peer], false, None);
        assert_eq!(conversation_title(&personal, me), "Chat with 0123abcd");
    }

    #[test]
    fn group_titles_prefer_the_name() {
        let me = Uuid::new_v4();
        let named = conversation(vec![me, Uuid::new_v4()], true, Some("Team"));
        let unnamed = conversation(vec![me, Uuid::new_v4(), Uuid::new_v4()], true, Some("  "));
        assert_eq!(conversation_title(&named, me), "Team");
        assert_eq!(conversation_title(&unnamed, me), "Group of 3");
    }
}
