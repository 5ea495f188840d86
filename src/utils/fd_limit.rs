//! File descriptor limit detection for capping the open-files semaphore (Unix).

/// Estimated descriptors held per semaphore slot (the file or directory plus walkdir's handle).
pub const FDS_PER_SLOT: usize = 2;

/// Fraction of the process FD limit to use (leave headroom for channels, stdio, the runtime).
const FD_LIMIT_FRACTION: f64 = 0.8;

/// Returns the soft limit for max open file descriptors, or `None` if unavailable (e.g. Windows).
#[cfg(unix)]
pub fn max_open_fds() -> Option<u64> {
    use std::mem::MaybeUninit;
    let mut rlim = MaybeUninit::<libc::rlimit>::uninit();
    if unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, rlim.as_mut_ptr()) } != 0 {
        return None;
    }
    let rlim = unsafe { rlim.assume_init() };
    let cur = rlim.rlim_cur;
    // RLIM_INFINITY is typically !0 or u64::MAX; treat as "no practical limit"
    if cur == libc::RLIM_INFINITY || cur > i64::MAX as u64 {
        return None;
    }
    Some(cur as u64)
}

#[cfg(not(unix))]
pub fn max_open_fds() -> Option<u64> {
    None
}

/// Most semaphore slots that stay under ~80% of the FD limit, or `None` when there is no limit.
pub fn max_slots_by_fd_limit() -> Option<usize> {
    let limit = max_open_fds()?;
    let usable = (limit as f64 * FD_LIMIT_FRACTION) as usize;
    Some((usable / FDS_PER_SLOT).max(1))
}

/// `requested` slots, lowered to what the FD limit allows.
pub fn cap_open_files(requested: usize) -> usize {
    match max_slots_by_fd_limit() {
        Some(cap) if cap < requested => {
            log::debug!("Capping open files {} -> {} (FD limit ~80%)", requested, cap);
            cap
        }
        _ => requested.max(1),
    }
}
