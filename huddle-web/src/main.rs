mod api;
mod app;
mod components;
mod pages;
mod routes;
#[cfg(test)]
mod routes_test;

use std::panic::PanicHookInfo;

use app::App;
use yew::Renderer;

fn describe_panic(info: &PanicHookInfo<'_>) -> String {
    let payload = info
        .payload()
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| info.payload().downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");
    match info.location() {
        Some(at) => format!("huddle panicked: {payload} ({}:{})", at.file(), at.line()),
        None => format!("huddle panicked: {payload}"),
    }
}

fn main() {
    std::panic::set_hook(Box::new(|info| {
        web_sys::console::error_1(&describe_panic(info).into());
    }));

    let body = web_sys::window()
        .and_then(|window| window.document())
        .and_then(|document| document.body());
    match body {
        Some(body) => Renderer::<App>::with_root(body.into()).render(),
        None => Renderer::<App>::new().render(),
    };
}
