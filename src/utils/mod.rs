// Utility functions

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Get the .livegen directory for a project (or the home directory)
#[inline]
pub fn livegen_dir(base: &Path) -> PathBuf {
    base.join(crate::config::CONFIG_DIR)
}

/// Get the .livegen/prompts directory for a project (or the home directory)
#[inline]
pub fn prompts_dir(base: &Path) -> PathBuf {
    livegen_dir(base).join("prompts")
}

/// Extension trait for Result that provides convenient error context methods.
/// Converts any error to a String with a descriptive message prefix.
pub trait ResultExt<T> {
    /// Converts the error to a String with context message.
    fn with_context(self, msg: &str) -> Result<T, String>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn with_context(self, msg: &str) -> Result<T, String> {
        self.map_err(|e| format!("{}: {}", msg, e))
    }
}

/// Acquire a mutex lock, recovering from poisoning by returning the guard.
pub fn lock_mutex_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("Mutex was poisoned, recovering: {}", poisoned);
            poisoned.into_inner()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_livegen_dir() {
        let dir = livegen_dir(Path::new("/home/user/project"));
        assert_eq!(dir, PathBuf::from("/home/user/project/.livegen"));
    }

    #[test]
    fn test_prompts_dir() {
        let dir = prompts_dir(Path::new("/home/user/project"));
        assert_eq!(dir, PathBuf::from("/home/user/project/.livegen/prompts"));
    }

    #[test]
    fn test_with_context() {
        let result: Result<(), String> = Err("boom".to_string());
        assert_eq!(result.with_context("Failed to load").unwrap_err(), "Failed to load: boom");
    }

    #[test]
    fn test_lock_recovers_from_poison() {
        let mutex = std::sync::Arc::new(Mutex::new(1));
        let poisoner = mutex.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison");
        })
        .join();
        assert_eq!(*lock_mutex_recover(&mutex), 1);
    }
}
