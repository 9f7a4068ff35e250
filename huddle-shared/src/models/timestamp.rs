use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use yew::{Html, ToHtml, html};

/// UTC instant used for message ordering and conversation activity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl ToHtml for Timestamp {
    fn to_html(&self) -> Html {
        html! { self.0.format("%H:%M").to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn renders_clock_time() {
        let ts = Timestamp(Utc.with_ymd_and_hms(2025, 3, 8, 14, 30, 0).unwrap());
        assert_eq!(ts.to_html(), html! { "14:30" });
    }

    #[test]
    fn serializes_as_rfc3339() {
        let ts = Timestamp(Utc.with_ymd_and_hms(2025, 3, 8, 14, 30, 0).unwrap());
        assert_eq!(
            serde_json::to_string(&ts).unwrap(),
            "\"2025-03-08T14:30:00Z\""
        );
    }

    #[test]
    fn orders_chronologically() {
        let earlier = Timestamp(Utc.with_ymd_and_hms(2025, 3, 8, 14, 30, 0).unwrap());
        let later = Timestamp(Utc.with_ymd_and_hms(2025, 3, 8, 14, 30, 1).unwrap());
        assert!(earlier < later);
    }
}
