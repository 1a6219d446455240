const PUSHBULLET_TOKEN: &str = "PUSHBULLET_TOKEN";

/// Pushbullet access token from the environment, blank values ignored.
pub fn get_pushbullet_token() -> Option<String> {
    let token_from_env = std::env::var(PUSHBULLET_TOKEN);
    token_from_env.ok().filter(|token| !token.trim().is_empty())
}

const MINILIDE_CONFIG: &str = "MINILIDE_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config.json";

pub fn get_config_path() -> String {
    let path_from_env = std::env::var(MINILIDE_CONFIG);
    path_from_env.unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}
