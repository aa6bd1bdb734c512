use yew::prelude::*;
use yew_router::prelude::Link;

use crate::Route;

#[function_component(NotFound)]
pub fn not_found() -> Html {
    html! {
        <div class="flex flex-col items-center py-24">
            <h1 class="text-3xl font-bold mb-4 text-gray-900 dark:text-white">{ "This storefront is closed" }</h1>
            <Link<Route> to={Route::Home} classes="text-blue-500 hover:underline">{ "Back to the mall" }</Link<Route>>
        </div>
    }
}
