use std::sync::atomic::AtomicU32;
use std::time::Duration;

#[cfg(target_os = "linux")]
fn to_timespec(timeout: Duration) -> libc::timespec {
    libc::timespec {
        tv_sec: timeout.as_secs() as libc::time_t,
        tv_nsec: timeout.subsec_nanos() as libc::c_long,
    }
}

/// Sleeps while `atomic` still holds `expected`, for at most `timeout`.
///
/// Returns early on a wake, a value change, or a spurious wakeup; callers
/// re-check their own condition afterwards.
#[cfg(target_os = "linux")]
pub fn futex_wait_timeout(atomic: &AtomicU32, expected: u32, timeout: Duration) {
    use std::sync::atomic::Ordering;

    // Check condition first to avoid syscall if possible
    if atomic.load(Ordering::Relaxed) != expected {
        return;
    }

    let ts = to_timespec(timeout);
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            atomic as *const AtomicU32 as *const u32,
            libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
            expected,
            &ts as *const libc::timespec,
            std::ptr::null::<u32>(),
            0u32,
        );
    }
}

/// Wakes every thread parked on `atomic`.
#[cfg(target_os = "linux")]
pub fn futex_wake_all(atomic: &AtomicU32) {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            atomic as *const AtomicU32 as *const u32,
            libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
            i32::MAX,
            std::ptr::null::<libc::timespec>(),
            std::ptr::null::<u32>(),
            0u32,
        );
    }
}

#[cfg(not(target_os = "linux"))]
pub fn futex_wait_timeout(_atomic: &AtomicU32, _expected: u32, _timeout: Duration) {
    // Fallback for non-Linux: busy wait with yield
    std::thread::yield_now();
}

#[cfg(not(target_os = "linux"))]
pub fn futex_wake_all(_atomic: &AtomicU32) {
    // No-op on non-Linux
}
