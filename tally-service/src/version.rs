//! Build/version info reported on the `/version` endpoint.
//!
//! The teacher's services report this via an internal `nodes-common` crate
//! not available outside Taceo's workspace; this is a local equivalent that
//! reports the crate name and version baked in at compile time.

/// Returns `"{package name} {package version}"`, e.g. `"tally-service 0.1.0"`.
pub fn version_info() -> String {
    format!(
        "{} {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )
}
