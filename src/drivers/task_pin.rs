//! FreeRTOS task placement for the beacon's two threads.
//!
//! | Task       | Runs                                   | Priority | Stack |
//! |------------|----------------------------------------|----------|-------|
//! | `bthome`   | dispatcher executor (`crate::task`)    | 5        | 8 KB  |
//! | `button`   | GPIO poll + gesture detection          | 4        | 4 KB  |
//!
//! On ESP-IDF a [`TaskSpec`] is applied through `esp_pthread_set_cfg()`,
//! which only affects the next `pthread_create()` on the calling thread;
//! keep the pair adjacent.

use std::io;
use std::thread::JoinHandle;

/// Priority, stack and name of one firmware task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSpec {
    /// NUL-terminated for FreeRTOS.
    pub name: &'static str,
    pub priority: u8,
    pub stack_kb: usize,
}

impl TaskSpec {
    pub const DISPATCHER: Self = Self {
        name: "bthome\0",
        priority: 5,
        stack_kb: 8,
    };

    pub const BUTTON_INPUT: Self = Self {
        name: "button\0",
        priority: 4,
        stack_kb: 4,
    };

    /// Thread name without the terminator.
    pub fn thread_name(&self) -> &'static str {
        self.name.trim_end_matches('\0')
    }
}

#[cfg(target_os = "espidf")]
pub fn spawn_task(spec: TaskSpec, f: impl FnOnce() + Send + 'static) -> io::Result<JoinHandle<()>> {
    // SAFETY: the config is initialised by esp_create_default_pthread_config
    // and `spec.name` is 'static and NUL-terminated.
    unsafe {
        let mut cfg = esp_idf_sys::esp_create_default_pthread_config();
        cfg.prio = spec.priority as i32;
        cfg.stack_size = (spec.stack_kb * 1024) as i32;
        cfg.thread_name = spec.name.as_ptr() as *const _;
        let ret = esp_idf_sys::esp_pthread_set_cfg(&cfg);
        if ret != esp_idf_sys::ESP_OK as i32 {
            return Err(io::Error::other(format!(
                "esp_pthread_set_cfg({}) failed: {ret}",
                spec.thread_name()
            )));
        }
    }

    log::info!("Task {} up: prio {}, {} KB stack", spec.thread_name(), spec.priority, spec.stack_kb);
    std::thread::Builder::new().name(spec.thread_name().into()).spawn(f)
}

/// Host build: a named std thread, priority ignored.
#[cfg(not(target_os = "espidf"))]
pub fn spawn_task(spec: TaskSpec, f: impl FnOnce() + Send + 'static) -> io::Result<JoinHandle<()>> {
    log::debug!("Task {} up (host, {} KB stack)", spec.thread_name(), spec.stack_kb);
    std::thread::Builder::new()
        .name(spec.thread_name().into())
        .stack_size(spec.stack_kb * 1024)
        .spawn(f)
}
