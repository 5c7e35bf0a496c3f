//! Real-time scheduling helpers (Linux SCHED_FIFO / mlockall; other
//! unixes mlockall only).

use crate::cli::RtLock;

#[cfg(target_os = "linux")]
pub fn setup_rt_once(rt: bool, prio: Option<i32>, lock: RtLock) {
    use libc::{SCHED_FIFO, sched_get_priority_max, sched_get_priority_min, sched_param,
        sched_setscheduler};
    use std::sync::OnceLock;
    static RT_ONCE: OnceLock<()> = OnceLock::new();

    if !rt {
        return;
    }

    // Apply process memory locking according to the selected mode.
    #[inline]
    fn try_apply_mem_lock(lock: RtLock) -> eyre::Result<()> {
        use libc::{MCL_CURRENT, MCL_FUTURE, mlockall};

        #[inline]
        fn is_retryable_memlock_error(err: &std::io::Error) -> bool {
            matches!(err.raw_os_error(), Some(code) if code == libc::EPERM || code == libc::ENOMEM)
        }

        #[inline]
        fn lock_with(flags: libc::c_int) -> std::io::Result<()> {
            let rc = unsafe { mlockall(flags) };
            if rc != 0 {
                Err(std::io::Error::last_os_error())
            } else {
                Ok(())
            }
        }

        let attempted_all = matches!(lock, RtLock::All);
        let result = match lock {
            RtLock::None => Ok(()),
            RtLock::Current => lock_with(MCL_CURRENT),
            RtLock::All => lock_with(MCL_CURRENT | MCL_FUTURE),
        };
        let Err(err) = result else { return Ok(()) };

        // Fallback: if All failed due to permission or memory, try Current
        if attempted_all && is_retryable_memlock_error(&err) && lock_with(MCL_CURRENT).is_ok() {
            return Ok(());
        }

        let mut msg = format!(
            "mlockall({}) failed: {}",
            if attempted_all { "current|future" } else { "current" },
            err
        );
        if is_retryable_memlock_error(&err) {
            msg.push_str("; hint: needs CAP_IPC_LOCK (or root) and sufficient 'ulimit -l'");
        }
        Err(eyre::eyre!(msg))
    }

    // Apply SCHED_FIFO priority, clamped to the system range.
    #[inline]
    fn try_apply_fifo_priority(prio: Option<i32>) -> eyre::Result<()> {
        let (min, max) = unsafe {
            let min = sched_get_priority_min(SCHED_FIFO);
            let max = sched_get_priority_max(SCHED_FIFO);
            if min < 0 || max < 0 { (1, 99) } else { (min, max) }
        };
        let wanted = prio.unwrap_or(max);
        let param = sched_param {
            sched_priority: wanted.clamp(min, max),
        };
        let rc = unsafe { sched_setscheduler(0, SCHED_FIFO, &param) };
        if rc != 0 {
            Err(eyre::eyre!(
                "{}; hint: needs CAP_SYS_NICE or root",
                std::io::Error::last_os_error()
            ))
        } else {
            Ok(())
        }
    }

    RT_ONCE.get_or_init(|| {
        match try_apply_mem_lock(lock) {
            Ok(()) => match lock {
                RtLock::None => eprintln!("RT: memory locking disabled (none)"),
                RtLock::Current => eprintln!("RT: memory lock = current"),
                RtLock::All => eprintln!("RT: memory lock = all (current|future)"),
            },
            Err(err) => eprintln!("Warning: mlockall failed: {err}"),
        }
        if let Err(err) = try_apply_fifo_priority(prio) {
            let prio_dbg = prio
                .map(|p| p.to_string())
                .unwrap_or_else(|| "(max)".into());
            eprintln!("Warning: sched_setscheduler(SCHED_FIFO, prio={prio_dbg}) failed: {err}");
        }
    });
}

#[cfg(all(unix, not(target_os = "linux")))]
pub fn setup_rt_once(rt: bool, _prio: Option<i32>, lock: RtLock) {
    use libc::{MCL_CURRENT, MCL_FUTURE, mlockall};
    use std::sync::OnceLock;
    static RT_ONCE: OnceLock<()> = OnceLock::new();
    if !rt {
        return;
    }
    RT_ONCE.get_or_init(|| {
        let flags = match lock {
            RtLock::None => {
                eprintln!("RT: memory locking disabled (none)");
                return;
            }
            RtLock::Current => MCL_CURRENT,
            RtLock::All => MCL_CURRENT | MCL_FUTURE,
        };
        let rc = unsafe { mlockall(flags) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            eprintln!("Warning: mlockall failed: {err}");
        }
        eprintln!("Warning: SCHED_FIFO is unavailable on this OS; only mlockall applied.");
    });
}

#[cfg(not(unix))]
pub fn setup_rt_once(rt: bool, _prio: Option<i32>, _lock: RtLock) {
    if rt {
        eprintln!("Warning: real-time mode is not supported on this OS");
    }
}
