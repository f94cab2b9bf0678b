//! Starter files written by `tddforge init`.

pub mod go;

use crate::models::Provider;

/// Starter `tddforge.toml` with `provider` selected
pub fn config_template(provider: Provider) -> String {
    let mut config = String::new();
    config.push_str("# tddforge configuration\n\n");
    config.push_str("[generation]\n");
    config.push_str(&format!("provider = \"{}\"\n", provider.config_key()));
    config.push_str("timeout_seconds = 300\n");
    config.push_str("stream_output = true\n\n");

    config.push_str(&provider_section(Provider::Anthropic, provider));
    config.push_str(&provider_section(Provider::Openai, provider));
    config.push_str(&provider_section(Provider::Ollama, provider));

    config.push_str(go::SANDBOX_SECTION);
    config.push_str("\n[behavior]\n");
    config.push_str("# max_iterations = 10\n");
    config.push_str("show_diff = false\n");
    config
}

/// Provider sections other than the selected one are written commented out
fn provider_section(section: Provider, selected: Provider) -> String {
    let body = match section {
        Provider::Anthropic => {
            "[anthropic]\nbase_url = \"https://api.anthropic.com\"\nkey = \"\"\nmodel = \"claude-3-5-sonnet-latest\"\nmax_tokens = 2048\n"
        }
        Provider::Openai => {
            "[openai]\nbase_url = \"https://api.openai.com/v1\"\nkey = \"\"\nmodel = \"chatgpt-4o-latest\"\n"
        }
        Provider::Ollama => "[ollama]\nurl = \"http://localhost:11434\"\nmodel = \"qwen2.5-coder:latest\"\n",
    };

    let mut out = String::new();
    for line in body.lines() {
        if section != selected {
            out.push_str("# ");
        }
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');
    out
}
