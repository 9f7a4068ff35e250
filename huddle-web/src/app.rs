use crate::api::HuddleClient;
use crate::components::loading::Loading;
use crate::pages::{ErrorPage, IdentityPage};
use crate::routes::{MainRoute, Session};
use gloo_storage::{LocalStorage, Storage};
use shared::models::SenderProfile;
use uuid::Uuid;
use wasm_bindgen_futures::spawn_local;
use yew::{Callback, Html, function_component, html, use_effect_with, use_state};
use yew_router::prelude::*;

/// Local storage key holding the user id this browser acts as.
pub const IDENTITY_KEY: &str = "huddle.user_id";

#[derive(Clone, PartialEq)]
enum Shell {
    SignedOut,
    Loading,
    Failed(String),
    Ready(Session),
}

fn stored_identity() -> Option<Uuid> {
    LocalStorage::get::<String>(IDENTITY_KEY)
        .ok()
        .and_then(|value| Uuid::parse_str(&value).ok())
}

#[function_component(App)]
pub fn app() -> Html {
    let identity = use_state(stored_identity);
    let shell = use_state(|| Shell::Loading);

    {
        let shell = shell.clone();
        use_effect_with(*identity, move |identity| {
            match *identity {
                None => shell.set(Shell::SignedOut),
                Some(user_id) => match HuddleClient::for_window(user_id) {
                    None => shell.set(Shell::Failed("No browser window available".into())),
                    Some(client) => {
                        shell.set(Shell::Loading);
                        spawn_local(async move {
                            match client.me().await {
                                Ok(me) => shell.set(Shell::Ready(Session { client, me })),
                                Err(err) => {
                                    shell.set(Shell::Failed(format!("Could not load profile: {err}")));
                                }
                            }
                        });
                    }
                },
            }
            || ()
        });
    }

    let on_identity = {
        let identity = identity.clone();
        Callback::from(move |user_id: Uuid| {
            if let Err(err) = LocalStorage::set(IDENTITY_KEY, user_id.to_string()) {
                web_sys::console::warn_1(&format!("Could not save identity: {err}").into());
            }
            identity.set(Some(user_id));
        })
    };

    let on_sign_out = {
        let identity = identity.clone();
        Callback::from(move |()| {
            LocalStorage::delete(IDENTITY_KEY);
            identity.set(None);
        })
    };

    match (*shell).clone() {
        Shell::SignedOut => html! { <IdentityPage on_submit={on_identity} /> },
        Shell::Loading => html! { <Loading /> },
        Shell::Failed(message) => html! {
            <div class="h-screen flex flex-col">
                <ErrorPage {message} />
                <div class="flex justify-center">
                    <button class="btn btn-ghost" type="button" onclick={on_sign_out.reform(|_| ())}>
                        {"Use a different identity"}
                    </button>
                </div>
            </div>
        },
        Shell::Ready(session) => html! {
            <BrowserRouter>
                <Switch<MainRoute> render={move |route| crate::routes::switch(route, session.clone(), on_sign_out.clone())} />
            </BrowserRouter>
        },
    }
}

/// Display label for the signed-in user.
pub fn display_name(profile: &SenderProfile) -> &str {
    if profile.display_name.trim().is_empty() {
        "You"
    } else {
        &profile.display_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_names_fall_back_to_you() {
        let mut profile = SenderProfile::unknown(Uuid::new_v4());
        assert_eq!(display_name(&profile), shared::models::UNKNOWN_USER_NAME);
        profile.display_name = "   ".into();
        assert_eq!(display_name(&profile), "You");
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod browser_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn stored_identity_ignores_garbage() {
        LocalStorage::set(IDENTITY_KEY, "not-a-user").unwrap();
        assert_eq!(stored_identity(), None);

        let id = Uuid::new_v4();
        LocalStorage::set(IDENTITY_KEY, id.to_string()).unwrap();
        assert_eq!(stored_identity(), Some(id));
        LocalStorage::delete(IDENTITY_KEY);
    }
}
