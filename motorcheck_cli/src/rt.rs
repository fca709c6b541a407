//! Real-time scheduling helpers (Linux SCHED_FIFO + mlockall; macOS mlockall).

use crate::cli::RtLock;
use std::sync::OnceLock;

static RT_ONCE: OnceLock<()> = OnceLock::new();

#[cfg(unix)]
fn try_apply_mem_lock(lock: RtLock) -> eyre::Result<()> {
    use libc::{MCL_CURRENT, MCL_FUTURE, mlockall};

    let flags = match lock {
        RtLock::None => return Ok(()),
        RtLock::Current => MCL_CURRENT,
        RtLock::All => MCL_CURRENT | MCL_FUTURE,
    };
    let rc = unsafe { mlockall(flags) };
    if rc == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();

    // All failed for lack of privilege or memory: settle for Current.
    let retryable = matches!(err.raw_os_error(), Some(code) if code == libc::EPERM || code == libc::ENOMEM);
    if lock == RtLock::All && retryable && unsafe { mlockall(MCL_CURRENT) } == 0 {
        tracing::warn!(error = %err, "mlockall(current|future) failed; locked current pages only");
        return Ok(());
    }
    let mut msg = format!("mlockall failed: {err}");
    if retryable {
        msg.push_str("; hint: needs CAP_IPC_LOCK (or root) and sufficient 'ulimit -l'");
    }
    Err(eyre::eyre!(msg))
}

#[cfg(target_os = "linux")]
fn try_apply_fifo_priority(prio: Option<i32>) -> eyre::Result<i32> {
    use libc::{SCHED_FIFO, sched_get_priority_max, sched_get_priority_min, sched_param};

    let (min, max) = unsafe {
        let min = sched_get_priority_min(SCHED_FIFO);
        let max = sched_get_priority_max(SCHED_FIFO);
        if min < 0 || max < 0 { (1, 99) } else { (min, max) }
    };
    let prio_val = prio.unwrap_or(max).clamp(min, max);
    let param = sched_param {
        sched_priority: prio_val,
    };
    let rc = unsafe { libc::sched_setscheduler(0, SCHED_FIFO, &param) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        eyre::bail!(
            "sched_setscheduler(SCHED_FIFO, {prio_val}) failed: {err}; needs CAP_SYS_NICE or root"
        );
    }
    Ok(prio_val)
}

/// Apply real-time settings once per process. Every step is best-effort:
/// failures are logged and the run continues.
pub fn setup_rt_once(rt: bool, prio: Option<i32>, lock: RtLock) {
    if !rt {
        return;
    }
    RT_ONCE.get_or_init(|| {
        #[cfg(unix)]
        {
            match try_apply_mem_lock(lock) {
                Ok(()) => tracing::info!(?lock, "RT: memory lock applied"),
                Err(err) => tracing::warn!(error = %err, "RT: memory lock not applied"),
            }
        }

        #[cfg(target_os = "linux")]
        {
            match try_apply_fifo_priority(prio) {
                Ok(p) => tracing::info!(prio = p, "RT: SCHED_FIFO enabled"),
                Err(err) => tracing::warn!(error = %err, "RT: scheduler unchanged"),
            }
        }

        #[cfg(not(target_os = "linux"))]
        {
            let _ = prio;
            tracing::warn!("RT: SCHED_FIFO is only supported on Linux");
        }
        #[cfg(not(unix))]
        {
            let _ = lock;
        }
    });
}
