use tracing::info;

/// Notified once after a restore finishes installing, with the names of the
/// packages that were actually installed.
pub trait PostInstallHook {
    fn installed(&self, names: &[String]);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogHook;

impl PostInstallHook for LogHook {
    fn installed(&self, names: &[String]) {
        if names.is_empty() {
            return;
        }
        info!(count = names.len(), packages = %names.join(", "), "packages installed");
    }
}
