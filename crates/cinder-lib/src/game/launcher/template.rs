/// Argument template rendering.
///
/// Version documents carry argument tokens like `${auth_player_name}`; the
/// engine maps each known placeholder to a concrete value at launch time.
use crate::game::launcher::types::{LaunchSpec, OsType};
use crate::game::version::document::{ArgumentToken, ArgumentValue, evaluate_rules};
use std::collections::HashMap;

/// Placeholder-to-value mapping for one launch attempt.
///
/// Rendering is per-token: a token is substituted only when it starts with
/// `$`, in which case the surrounding `${` and `}` are stripped and the bare
/// name is looked up. Tokens naming an unknown placeholder are dropped, so a
/// document referencing variables this launcher never provides (e.g. loader
/// extras) still renders cleanly.
#[derive(Debug, Clone, Default)]
pub struct TemplateEngine {
    values: HashMap<String, String>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn set_client_id(&mut self, client_id: &str) -> &mut Self {
        self.set("clientId", client_id)
    }

    pub fn set_xuid(&mut self, xuid: &str) -> &mut Self {
        self.set("auth_xuid", xuid)
    }

    pub fn set_username(&mut self, username: &str) -> &mut Self {
        self.set("auth_player_name", username)
    }

    /// Both the modern and legacy spellings point at the version id
    pub fn set_version(&mut self, version_id: &str) -> &mut Self {
        self.set("version_name", version_id);
        self.set("version", version_id)
    }

    pub fn set_game_directory(&mut self, path: &str) -> &mut Self {
        self.set("game_directory", path)
    }

    /// Legacy documents call the assets root `game_assets`
    pub fn set_assets_root(&mut self, path: &str) -> &mut Self {
        self.set("assets_root", path);
        self.set("game_assets", path)
    }

    pub fn set_assets_index_name(&mut self, name: &str) -> &mut Self {
        self.set("assets_index_name", name)
    }

    pub fn set_natives_directory(&mut self, path: &str) -> &mut Self {
        self.set("natives_directory", path)
    }

    pub fn set_uuid(&mut self, uuid: &str) -> &mut Self {
        self.set("auth_uuid", uuid);
        self.set("uuid", uuid)
    }

    /// The access token has accumulated three spellings over the years
    pub fn set_access_token(&mut self, token: &str) -> &mut Self {
        self.set("auth_access_token", token);
        self.set("auth_session", token);
        self.set("accessToken", token)
    }

    pub fn set_user_type(&mut self, user_type: &str) -> &mut Self {
        self.set("user_type", user_type)
    }

    pub fn set_version_type(&mut self, version_type: &str) -> &mut Self {
        self.set("version_type", version_type)
    }

    pub fn set_resolution(&mut self, width: u32, height: u32) -> &mut Self {
        self.set("resolution_width", width.to_string());
        self.set("resolution_height", height.to_string())
    }

    /// Populate every placeholder a [`LaunchSpec`] determines. The access
    /// token is supplied separately because it only exists after the
    /// authentication stage.
    pub fn apply_spec(&mut self, spec: &LaunchSpec) -> &mut Self {
        self.set_client_id(&spec.client_id);
        self.set_username(&spec.username);
        self.set_version(&spec.version_id);
        self.set_game_directory(&spec.game_dir.to_string_lossy());
        self.set_assets_root(&spec.assets_dir().to_string_lossy());
        self.set_natives_directory(&spec.natives_dir().to_string_lossy());
        self.set_uuid(&spec.uuid);
        self.set_user_type(&spec.user_type);
        if let Some(ref xuid) = spec.xuid {
            self.set_xuid(xuid);
        }
        if let (Some(w), Some(h)) = (spec.window_width, spec.window_height) {
            self.set_resolution(w, h);
        }
        self
    }

    /// Render a list of plain tokens. Non-placeholder tokens pass through
    /// untouched; placeholders resolve to their value or disappear.
    pub fn render(&self, tokens: &[String]) -> Vec<String> {
        let mut out = Vec::with_capacity(tokens.len());

        for token in tokens {
            if !token.starts_with('$') {
                out.push(token.clone());
                continue;
            }

            let name = token
                .get(2..token.len().saturating_sub(1))
                .unwrap_or_default();
            match self.values.get(name) {
                Some(value) => out.push(value.clone()),
                None => log::debug!("Dropping unrecognized argument placeholder {}", token),
            }
        }

        out
    }
}

/// Reduce rule-gated argument tokens to the plain strings that apply on the
/// given platform with the given feature flags
pub fn flatten_tokens(
    tokens: &[ArgumentToken],
    os: OsType,
    features: &HashMap<String, bool>,
) -> Vec<String> {
    let mut out = Vec::new();

    for token in tokens {
        match token {
            ArgumentToken::Plain(s) => out.push(s.clone()),
            ArgumentToken::Conditional { rules, value } => {
                if evaluate_rules(rules, os, features) {
                    match value {
                        ArgumentValue::Single(s) => out.push(s.clone()),
                        ArgumentValue::Multiple(list) => out.extend(list.iter().cloned()),
                    }
                }
            }
        }
    }

    out
}
