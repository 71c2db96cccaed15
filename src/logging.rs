//! Panic hook and log sink wiring for the `wasm32` target.
//!
//! Mirrors the teacher's own `main.rs` setup (panic hook + `wasm_logger`
//! gated to `wasm32`, everything else reaching `log` straight to stderr).

/// Installs the browser console panic hook and routes `log` macros to the
/// console. A no-op off `wasm32` — native builds (including every test in
/// this crate) get `log`'s default no-op sink unless a host installs its
/// own logger first.
pub fn install() {
    #[cfg(target_arch = "wasm32")]
    {
        console_error_panic_hook::set_once();
        wasm_logger::init(wasm_logger::Config::new(log::Level::Info));
    }
    log::info!("long_scroll: logging installed");
}
