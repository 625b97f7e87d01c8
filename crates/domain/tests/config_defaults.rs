use tc_domain::config::{Config, ConfigSeverity};

#[test]
fn default_config_is_valid() {
    let config = Config::default();
    let errors: Vec<_> = config
        .validate()
        .into_iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .collect();
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
}

#[test]
fn default_loop_and_tool_limits() {
    let config = Config::default();
    assert_eq!(config.conversation.max_iterations, 5);
    assert_eq!(config.tools.fetch.max_text_chars, 300_000);
    assert_eq!(config.tools.fetch.preview_chars, 500);
    assert_eq!(config.tools.search.default_num_results, 5);
    assert_eq!(config.tools.search.endpoint, "https://html.duckduckgo.com/html/");
    assert_eq!(config.tools.sandbox.python, "python3");
}

#[test]
fn partial_toml_keeps_other_defaults() {
    let toml_str = r#"
[conversation]
max_iterations = 8

[tools.sandbox]
timeout_sec = 30
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.conversation.max_iterations, 8);
    assert_eq!(config.tools.sandbox.timeout_sec, 30);
    assert_eq!(config.tools.sandbox.install_timeout_sec, 300);
    assert_eq!(config.llm.default_model, "claude-3-5-sonnet-latest");
}

#[test]
fn llm_section_parses() {
    let toml_str = r#"
[llm]
base_url = "http://localhost:8080"
default_model = "claude-3-5-haiku-latest"
temperature = 0.0

[llm.auth]
service = "toolchat"
account = "anthropic"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.llm.base_url, "http://localhost:8080");
    assert_eq!(config.llm.default_model, "claude-3-5-haiku-latest");
    assert_eq!(config.llm.auth.service.as_deref(), Some("toolchat"));
    assert_eq!(config.llm.max_output_tokens, 4096);
}

#[test]
fn zero_iterations_is_an_error() {
    let mut config = Config::default();
    config.conversation.max_iterations = 0;
    let issues = config.validate();
    assert!(issues.iter().any(|e| {
        e.severity == ConfigSeverity::Error && e.field == "conversation.max_iterations"
    }));
}

#[test]
fn two_iterations_warns_about_tools() {
    let mut config = Config::default();
    config.conversation.max_iterations = 2;
    let issues = config.validate();
    assert!(issues.iter().any(|e| {
        e.severity == ConfigSeverity::Warning && e.field == "conversation.max_iterations"
    }));
}

#[test]
fn empty_base_url_is_an_error() {
    let mut config = Config::default();
    config.llm.base_url.clear();
    let issues = config.validate();
    assert!(issues.iter().any(|e| e.field == "llm.base_url"));
}
