//! Go toolchain defaults

/// `go.mod` for a fresh sandbox module
pub const GO_MOD: &str = "module sandbox\n\ngo 1.21\n";

/// `[sandbox]` section of the starter config
pub const SANDBOX_SECTION: &str = r#"[sandbox]
impl_path = "./sandbox/main.go"
test_path = "./sandbox/main_test.go"
language = "Go"
fence_tag = "go"
prepare_commands = ["go mod tidy"]
format_commands = ["gofmt -w .", "goimports -w ."]
test_command = "go test . -v"
command_timeout_seconds = 300
"#;
