//! Process resource limits.
//!
//! Every in-flight probe holds a socket and a DNS lookup may hold another, so
//! the open file soft limit should be at least twice the worker count.

/// Raise the `RLIMIT_NOFILE` soft limit to `want`, capped at the hard limit.
///
/// Returns the soft limit in effect afterwards.
#[cfg(unix)]
pub fn ensure_descriptor_limit(want: u64) -> std::io::Result<u64> {
    let mut current = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: `current` is a valid, writable rlimit struct.
    if unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut current) } != 0 {
        return Err(std::io::Error::last_os_error());
    }

    let have = current.rlim_cur as u64;
    if have >= want {
        tracing::debug!(
            "File descriptor limit already sufficient: want {}, have {}",
            want,
            have
        );
        return Ok(have);
    }

    let target = (want as libc::rlim_t).min(current.rlim_max);
    if (target as u64) < want {
        tracing::warn!(
            "File descriptor hard limit {} is below the wanted {}",
            current.rlim_max,
            want
        );
    }

    let updated = libc::rlimit {
        rlim_cur: target,
        rlim_max: current.rlim_max,
    };
    // SAFETY: `updated` is a valid rlimit struct.
    if unsafe { libc::setrlimit(libc::RLIMIT_NOFILE, &updated) } != 0 {
        return Err(std::io::Error::last_os_error());
    }

    tracing::info!("Raised file descriptor limit from {} to {}", have, target);
    Ok(target as u64)
}

#[cfg(not(unix))]
pub fn ensure_descriptor_limit(want: u64) -> std::io::Result<u64> {
    tracing::debug!("File descriptor limits not managed on this platform (want {})", want);
    Ok(want)
}
