// Per-thread signal mask handling for the startup window.
//
// Threads spawned while the mask is held inherit it, so workers never run the
// termination handler; only the thread that restores the mask can.

use std::io;
use std::mem::MaybeUninit;

/// The signal mask that was active before [`SignalMask::block_all`].
pub struct SignalMask {
    previous: libc::sigset_t,
    restored: bool,
}

impl SignalMask {
    /// Block every blockable signal on the calling thread.
    pub fn block_all() -> io::Result<Self> {
        let mut all = MaybeUninit::<libc::sigset_t>::uninit();
        let mut previous = MaybeUninit::<libc::sigset_t>::uninit();

        unsafe {
            if libc::sigfillset(all.as_mut_ptr()) == -1 {
                return Err(io::Error::last_os_error());
            }
            // pthread_sigmask reports failure through its return value, not errno
            let rc = libc::pthread_sigmask(libc::SIG_BLOCK, all.as_ptr(), previous.as_mut_ptr());
            if rc != 0 {
                return Err(io::Error::from_raw_os_error(rc));
            }

            Ok(Self {
                previous: previous.assume_init(),
                restored: false,
            })
        }
    }

    /// Reinstate the mask that was active before blocking.
    pub fn restore(mut self) -> io::Result<()> {
        self.restored = true;
        Self::set_mask(&self.previous)
    }

    /// Whether `signal` is currently blocked on the calling thread.
    pub fn is_blocked(signal: libc::c_int) -> io::Result<bool> {
        let mut current = MaybeUninit::<libc::sigset_t>::uninit();
        unsafe {
            let rc = libc::pthread_sigmask(libc::SIG_BLOCK, std::ptr::null(), current.as_mut_ptr());
            if rc != 0 {
                return Err(io::Error::from_raw_os_error(rc));
            }
            match libc::sigismember(current.as_ptr(), signal) {
                -1 => Err(io::Error::last_os_error()),
                member => Ok(member == 1),
            }
        }
    }

    fn set_mask(mask: &libc::sigset_t) -> io::Result<()> {
        let rc = unsafe { libc::pthread_sigmask(libc::SIG_SETMASK, mask, std::ptr::null_mut()) };
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
        Ok(())
    }
}

impl Drop for SignalMask {
    fn drop(&mut self) {
        // Dropped without restore() on an early error path
        if !self.restored {
            if let Err(e) = Self::set_mask(&self.previous) {
                log::warn!("failed to restore signal mask: {}", e);
            }
        }
    }
}
