//! Compile-time app configuration
//!
//! All values are baked at build time from app.config.json.

macro_rules! baked_config {
    ($name:ident, $env:literal) => {
        pub fn $name() -> &'static str {
            option_env!($env).expect(concat!(
                $env,
                " not baked at build time. Check build.rs and app.config.json"
            ))
        }
    };
}

// App display name (e.g., "Clinic Desktop")
baked_config!(app_name, "CLINIC_APP_NAME");

// App slug for machine use (e.g., "clinic-desktop")
baked_config!(app_slug, "CLINIC_APP_SLUG");

// App identifier for OS (e.g., "id.clinic.desktop")
baked_config!(app_identifier, "CLINIC_APP_IDENTIFIER");

// Session lifetime in minutes (e.g., "480")
baked_config!(session_ttl_raw, "CLINIC_SESSION_TTL_MINUTES");

const FALLBACK_SESSION_TTL_MINUTES: i64 = 480;

/// Session lifetime, falling back to a working day if the baked value is unusable
pub fn session_ttl() -> chrono::Duration {
    let minutes = session_ttl_raw()
        .parse::<i64>()
        .ok()
        .filter(|m| *m > 0)
        .unwrap_or(FALLBACK_SESSION_TTL_MINUTES);
    chrono::Duration::minutes(minutes)
}
