use yew::prelude::*;

use crate::components::SpinToWin;

#[function_component(Home)]
pub fn home() -> Html {
    html! {
        <div class="flex flex-col items-center w-full py-12 px-4">
            <h1 class="text-4xl font-bold mb-2 text-gray-900 dark:text-white">{ "Retailstar Mall" }</h1>
            <p class="text-gray-600 dark:text-gray-400 mb-8">{ "Spin for tickets, cash them in for prizes." }</p>
            <SpinToWin />
        </div>
    }
}
