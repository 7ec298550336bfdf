/// Error taxonomy kinds from the design: each `ErrorCode` maps to exactly
/// one kind, and the kind (not the specific code) is what callers and the
/// MCP handler layer are expected to branch on.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    // Validation (10000-10999) - surfaced synchronously, never retried.
    InvalidParameter = 10000,
    InvalidPolicy = 10010,
    InvalidSchedule = 10020,
    ExceedsLimitation = 10030,

    // Authentication / authorization (20000-20999)
    Unauthenticated = 20000,
    SessionExpired = 20010,
    PermissionDenied = 20020,

    // Not found (30000-30999) - cross-user access attempts land here too.
    ResourceNotFound = 30000,

    // Conflict (40000-40999)
    SingleFlightViolation = 40000,
    AlreadyExists = 40010,

    // Transient provider error (50000-50999) - retried by the executor.
    ProviderTransient = 50000,
    ProviderRateLimited = 50010,
    ProviderTimeout = 50020,

    // Safety protection is not an error kind from the caller's perspective;
    // it is represented as a successful `SafetyCheckResult`, not a code.

    // Internal (70000-70999)
    InternalError = 70000,
    ConnectionPoolTimeout = 70010,
}

impl ErrorCode {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorCode::ProviderTransient
                | ErrorCode::ProviderRateLimited
                | ErrorCode::ProviderTimeout
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ErrorCode::ResourceNotFound)
    }

    pub fn reason(&self) -> &'static str {
        match self {
            ErrorCode::InvalidParameter => "invalid_parameter",
            ErrorCode::InvalidPolicy => "invalid_policy",
            ErrorCode::InvalidSchedule => "invalid_schedule",
            ErrorCode::ExceedsLimitation => "exceeds_limitation",
            ErrorCode::Unauthenticated => "unauthenticated",
            ErrorCode::SessionExpired => "session_expired",
            ErrorCode::PermissionDenied => "permission_denied",
            ErrorCode::ResourceNotFound => "not_found",
            ErrorCode::SingleFlightViolation => "single_flight_violation",
            ErrorCode::AlreadyExists => "already_exists",
            ErrorCode::ProviderTransient => "provider_transient",
            ErrorCode::ProviderRateLimited => "provider_rate_limited",
            ErrorCode::ProviderTimeout => "provider_timeout",
            ErrorCode::InternalError => "internal_error",
            ErrorCode::ConnectionPoolTimeout => "connection_pool_timeout",
        }
    }
}
