use serde::{Serialize, Serializer};

/// Business-level result discriminator carried next to the HTTP status.
///
/// 1000s are success variants, 2000s generic errors, 3000s user-domain
/// outcomes. The numeric value doubles as the translation key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ResultCode {
    Ok = 1000,
    LoginSuccess = 1001,
    LoginSuccessNoToken = 1002,
    LogoutSuccess = 1003,
    Created = 1004,
    Accepted = 1005,
    NoContent = 1006,

    BadRequest = 2000,
    Unauthorized = 2001,
    Forbidden = 2002,
    NotFound = 2003,
    ValidationError = 2004,
    LoginInvalidCredentials = 2005,
    ServerError = 2006,
    TooManyRequests = 2007,

    CreatedUserSuccessfully = 3000,
    CreatedUserUnsuccessfully = 3001,
    GetUserSuccessfully = 3002,
    GetUserUnsuccessfully = 3003,
    GetUserNotFound = 3004,
    UpdateUserSuccessfully = 3005,
    UpdateUserUnsuccessfully = 3006,
    DeleteUserSuccessfully = 3007,
    DeleteUserUnsuccessfully = 3008,
}

impl ResultCode {
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Key under which translation catalogs store the message for this code.
    pub fn translation_key(self) -> String {
        self.code().to_string()
    }

    pub fn is_success(self) -> bool {
        (1000..2000).contains(&self.code())
    }
}

impl Serialize for ResultCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.code())
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_number() {
        assert_eq!(serde_json::to_value(ResultCode::GetUserNotFound).unwrap(), serde_json::json!(3004));
        assert_eq!(ResultCode::LoginSuccess.translation_key(), "1001");
    }

    #[test]
    fn success_band() {
        assert!(ResultCode::NoContent.is_success());
        assert!(!ResultCode::ValidationError.is_success());
        assert!(!ResultCode::CreatedUserSuccessfully.is_success());
    }
}
