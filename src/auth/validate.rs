use lazy_static::lazy_static;
use regex::Regex;

use crate::auth::dto::{FieldErrors, LoginRequest, RegisterRequest};

lazy_static! {
    static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_]+$").unwrap();
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

fn push(errors: &mut FieldErrors, field: &str, message: &str) {
    errors
        .entry(field.to_owned())
        .or_default()
        .push(message.to_owned());
}

fn check_username(username: &str, errors: &mut FieldErrors) {
    if username.is_empty() {
        push(errors, "username", "username is required");
        return;
    }
    if username.len() < 3 {
        push(errors, "username", "username must be at least 3 characters");
    }
    if username.len() > 50 {
        push(errors, "username", "username must be at most 50 characters");
    }
    if !USERNAME_RE.is_match(username) {
        push(
            errors,
            "username",
            "username may only contain letters, digits and underscores",
        );
    }
}

fn check_password(password: &str, errors: &mut FieldErrors) {
    if password.is_empty() {
        push(errors, "password", "password is required");
        return;
    }
    if password.len() < 6 {
        push(errors, "password", "password must be at least 6 characters");
    }
    if password.len() > 100 {
        push(errors, "password", "password must be at most 100 characters");
    }
}

pub fn validate_register(req: &RegisterRequest) -> FieldErrors {
    let mut errors = FieldErrors::new();
    check_username(&req.username, &mut errors);
    check_password(&req.password, &mut errors);
    if req.confirm_password != req.password {
        push(&mut errors, "confirmPassword", "passwords do not match");
    }
    // An absent or empty email is fine; a provided one must be well-formed.
    if let Some(email) = req.email.as_deref().filter(|e| !e.is_empty()) {
        if email.len() > 100 {
            push(&mut errors, "email", "email must be at most 100 characters");
        }
        if !EMAIL_RE.is_match(email) {
            push(&mut errors, "email", "email is not a valid address");
        }
    }
    errors
}

pub fn validate_login(req: &LoginRequest) -> FieldErrors {
    let mut errors = FieldErrors::new();
    check_username(&req.username, &mut errors);
    check_password(&req.password, &mut errors);
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(username: &str, password: &str, confirm: &str, email: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            password: password.into(),
            confirm_password: confirm.into(),
            email: email.map(str::to_owned),
        }
    }

    #[test]
    fn valid_register_passes() {
        let errors = validate_register(&register("alice", "secret1", "secret1", None));
        assert!(errors.is_empty());
    }

    #[test]
    fn username_shape_is_enforced() {
        let errors = validate_register(&register("ab", "secret1", "secret1", None));
        assert!(errors.contains_key("username"));

        let errors = validate_register(&register("bad name!", "secret1", "secret1", None));
        assert!(errors.contains_key("username"));

        let long = "a".repeat(51);
        let errors = validate_register(&register(&long, "secret1", "secret1", None));
        assert!(errors.contains_key("username"));
    }

    #[test]
    fn password_length_is_enforced() {
        let errors = validate_register(&register("alice", "short", "short", None));
        assert!(errors.contains_key("password"));
    }

    #[test]
    fn confirm_password_must_match() {
        let errors = validate_register(&register("alice", "secret1", "secret2", None));
        assert_eq!(
            errors.get("confirmPassword").map(|v| v.len()),
            Some(1)
        );
    }

    #[test]
    fn bad_email_is_rejected_but_empty_is_allowed() {
        let errors = validate_register(&register("alice", "secret1", "secret1", Some("not-an-email")));
        assert!(errors.contains_key("email"));

        let errors = validate_register(&register("alice", "secret1", "secret1", Some("")));
        assert!(errors.is_empty());
    }

    #[test]
    fn login_validation_checks_both_fields() {
        let errors = validate_login(&LoginRequest {
            username: "".into(),
            password: "".into(),
        });
        assert!(errors.contains_key("username"));
        assert!(errors.contains_key("password"));
    }
}
