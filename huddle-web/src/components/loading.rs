use yew::{AttrValue, Html, Properties, function_component, html};

#[derive(Properties, PartialEq)]
pub struct LoadingProps {
    #[prop_or(AttrValue::Static("Connecting to Huddle"))]
    pub label: AttrValue,
}

/// Full-height placeholder shown while the session is resolved.
#[function_component(Loading)]
pub fn loading(props: &LoadingProps) -> Html {
    html! {
        <div class="h-screen flex items-center justify-center" role="status" aria-live="polite">
            <span class="loading loading-dots loading-md text-primary"></span>
            <span class="ml-3 text-base-content/70">{ props.label.clone() }</span>
        </div>
    }
}
