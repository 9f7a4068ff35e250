use yew::{AttrValue, Html, Properties, function_component, html};

#[derive(Properties, PartialEq)]
pub struct ErrorPageProps {
    #[prop_or(AttrValue::Static("Something went wrong."))]
    pub message: AttrValue,
}

/// `ErrorPage` page component
#[function_component(ErrorPage)]
pub fn error_page(props: &ErrorPageProps) -> Html {
    html! {
        <div class="p-4 space-y-6">
            <h1 class="text-2xl font-bold">{ "Error" }</h1>
            <p>{ props.message.clone() }</p>
        </div>
    }
}
