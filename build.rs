use std::fs;

fn main() {
    // Rerun if config changes
    println!("cargo:rerun-if-changed=app.config.json");

    // 1. Read app.config.json
    let config_path = "app.config.json";
    let config_str = fs::read_to_string(config_path).unwrap_or_else(|_| {
        panic!(
            "\n\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  BUILD ERROR: app.config.json not found                          ║\n\
            ╠══════════════════════════════════════════════════════════════════╣\n\
            ║  The host bakes its app identity and session settings from       ║\n\
            ║  app.config.json at the repository root.                         ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n\n"
        )
    });

    let config: serde_json::Value = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        panic!("\n\nBUILD ERROR: Invalid app.config.json: {}\n\n", e)
    });

    // 2. Extract and validate required fields
    let app = config.get("app").expect("app.config.json missing 'app' section");
    let session = config.get("session").expect("app.config.json missing 'session' section");

    let app_name = app.get("name").and_then(|v| v.as_str())
        .expect("app.config.json: app.name is required");
    let app_slug = app.get("slug").and_then(|v| v.as_str())
        .expect("app.config.json: app.slug is required");
    let app_identifier = app.get("identifier").and_then(|v| v.as_str())
        .expect("app.config.json: app.identifier is required");

    let ttl_minutes = session.get("ttlMinutes").and_then(|v| v.as_u64())
        .expect("app.config.json: session.ttlMinutes is required");

    // 3. Validate
    if app_slug.is_empty() {
        panic!("\n\nBUILD ERROR: app.slug cannot be empty in app.config.json\n\n");
    }
    if ttl_minutes == 0 {
        panic!("\n\nBUILD ERROR: session.ttlMinutes must be positive in app.config.json\n\n");
    }

    // 4. Bake values into binary at compile time
    println!("cargo:rustc-env=CLINIC_APP_NAME={}", app_name);
    println!("cargo:rustc-env=CLINIC_APP_SLUG={}", app_slug);
    println!("cargo:rustc-env=CLINIC_APP_IDENTIFIER={}", app_identifier);
    println!("cargo:rustc-env=CLINIC_SESSION_TTL_MINUTES={}", ttl_minutes);
}
