use web_sys::window;

pub fn get_api_base_url() -> String {
    if let Some(window) = window() {
        if let Ok(host) = window.location().host() {
            if host.contains("retailstar") {
                // Served by the backend itself in production
                return "".to_string();
            }

            let protocol = window.location().protocol().unwrap_or_else(|_| "http:".to_string());
            return format!("{}//{}", protocol, host);
        }
    }

    "http://127.0.0.1:3000".to_string()
}
