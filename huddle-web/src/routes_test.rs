//! Tests for route definitions and URL parameter parsing.

#[cfg(test)]
mod tests {
    use crate::routes::MainRoute;
    use uuid::Uuid;
    use yew_router::Routable;

    #[test]
    fn conversation_route_round_trips_through_path() {
        let id = Uuid::new_v4();
        let route = MainRoute::conversation(id);
        let path = route.to_path();
        assert_eq!(path, format!("/c/{id}"));
        assert_eq!(MainRoute::recognize(&path), Some(route));
    }

    #[test]
    fn unknown_paths_fall_back_to_not_found() {
        assert_eq!(
            MainRoute::recognize("/settings/profile"),
            Some(MainRoute::NotFound)
        );
        assert_eq!(MainRoute::recognize("/"), Some(MainRoute::Home));
    }

    #[test]
    fn malformed_ids_still_route_to_conversation() {
        assert_eq!(
            MainRoute::recognize("/c/not-a-uuid"),
            Some(MainRoute::Conversation {
                conversation_id: "not-a-uuid".to_string()
            })
        );
    }
}
