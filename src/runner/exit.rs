//! Platform adapter for encoder exit statuses.
//!
//! Raw OS exit codes are ambiguous: on Unix a signal death has no code at all,
//! on Windows a forced termination shows up as an NTSTATUS value far outside
//! the byte range (sometimes sign-extended). Everything is mapped into
//! `ExitClassification` here so the runner never looks at raw numbers.

use std::process::ExitStatus;

/// Known "terminated from outside" sentinels, in both unsigned and
/// sign-extended forms.
const KILLED_SENTINELS: &[i64] = &[
    -1,
    0xFFFF_FFFF,
    // STATUS_CONTROL_C_EXIT
    0xC000_013A,
    -1_073_741_510,
    // DBG_TERMINATE_PROCESS
    0x4001_0004,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClassification {
    Success,
    /// Clean non-zero exit inside the byte range
    Failure(i64),
    /// A recognised external-kill sentinel
    Killed(i64),
    /// No code, or a code that means nothing portable
    Abnormal(Option<i64>),
}

/// Raw code from a finished process, widened so Windows values fit
pub fn raw_exit_code(status: &ExitStatus) -> Option<i64> {
    status.code().map(i64::from)
}

pub fn classify_exit(code: Option<i64>) -> ExitClassification {
    match code {
        None => ExitClassification::Abnormal(None),
        Some(0) => ExitClassification::Success,
        Some(code) if (1..=255).contains(&code) => ExitClassification::Failure(code),
        Some(code) if KILLED_SENTINELS.contains(&code) => ExitClassification::Killed(code),
        Some(code) => ExitClassification::Abnormal(Some(code)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_exit() {
        assert_eq!(classify_exit(None), ExitClassification::Abnormal(None));
        assert_eq!(classify_exit(Some(0)), ExitClassification::Success);
        assert_eq!(classify_exit(Some(1)), ExitClassification::Failure(1));
        assert_eq!(classify_exit(Some(255)), ExitClassification::Failure(255));
        assert_eq!(classify_exit(Some(137)), ExitClassification::Failure(137));
    }

    #[test]
    fn test_windows_sentinels() {
        assert_eq!(classify_exit(Some(-1)), ExitClassification::Killed(-1));
        assert_eq!(classify_exit(Some(4_294_967_295)), ExitClassification::Killed(4_294_967_295));
        assert_eq!(classify_exit(Some(3_221_225_786)), ExitClassification::Killed(3_221_225_786));
        assert_eq!(classify_exit(Some(-1_073_741_510)), ExitClassification::Killed(-1_073_741_510));
    }

    #[test]
    fn test_out_of_range_codes_are_abnormal() {
        assert_eq!(classify_exit(Some(256)), ExitClassification::Abnormal(Some(256)));
        assert_eq!(classify_exit(Some(-2)), ExitClassification::Abnormal(Some(-2)));
        assert_eq!(
            classify_exit(Some(0xC000_0005)),
            ExitClassification::Abnormal(Some(0xC000_0005))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_signal_death_has_no_code() {
        use std::os::unix::process::ExitStatusExt;

        // raw wait status 9 = killed by SIGKILL
        let status = ExitStatus::from_raw(9);
        assert_eq!(raw_exit_code(&status), None);
        assert_eq!(classify_exit(raw_exit_code(&status)), ExitClassification::Abnormal(None));

        let status = ExitStatus::from_raw(3 << 8);
        assert_eq!(raw_exit_code(&status), Some(3));
    }
}
