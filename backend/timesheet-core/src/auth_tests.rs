// src/auth_tests.rs

#[cfg(test)]
mod tests {
    use axum::http::{header, HeaderMap, HeaderValue};

    use crate::auth::{
        clear_session_cookie, hash_password, session_cookie, session_id_from_headers,
        verify_password, SessionStore, UserStore,
    };
    use crate::error::AppError;
    use crate::test_support::{setup, teardown};

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("hunter2").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
        assert!(!verify_password("hunter2", "not-a-phc-string"));
    }

    #[test]
    fn test_register_persists_and_rejects_duplicates() {
        let test_name = "register_persists_and_rejects_duplicates";
        let store = setup(test_name);

        let mut users = UserStore::load(store.clone()).unwrap();
        assert!(!users.contains("jdoe"));
        users.register("Jane Doe", "jdoe", "secret").unwrap();

        let duplicate = users.register("Someone Else", "jdoe", "other");
        assert!(matches!(duplicate, Err(AppError::AlreadyExists(_))));

        // A fresh load sees the registered user
        let reloaded = UserStore::load(store.clone()).unwrap();
        assert!(reloaded.contains("jdoe"));
        let stored = store.load_users().unwrap();
        assert_eq!(stored.len(), 1);
        assert_ne!(stored["jdoe"].password, "secret");

        teardown(test_name);
    }

    #[test]
    fn test_register_requires_id_and_password() {
        let test_name = "register_requires_id_and_password";
        let store = setup(test_name);
        let mut users = UserStore::load(store.clone()).unwrap();

        assert!(matches!(users.register("Jane", "  ", "pw"), Err(AppError::BadRequest(_))));
        assert!(matches!(users.register("Jane", "jdoe", ""), Err(AppError::BadRequest(_))));
        assert!(!users.contains("jdoe"));
        assert!(store.load_users().unwrap().is_empty());

        teardown(test_name);
    }

    #[test]
    fn test_authenticate() {
        let test_name = "authenticate";
        let store = setup(test_name);
        let mut users = UserStore::load(store).unwrap();
        users.register("Jane Doe", "jdoe", "secret").unwrap();

        let record = users.authenticate("jdoe", "secret").unwrap();
        assert_eq!(record.name, "Jane Doe");
        assert!(matches!(users.authenticate("jdoe", "wrong"), Err(AppError::InvalidCredentials)));
        assert!(matches!(users.authenticate("nobody", "secret"), Err(AppError::InvalidCredentials)));

        teardown(test_name);
    }

    #[test]
    fn test_session_lifecycle() {
        let mut sessions = SessionStore::new(3600);
        let session = sessions.create("jdoe");

        assert_eq!(session.id.len(), 64);
        assert!(session.id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(sessions.get(&session.id).map(|s| s.user_id.as_str()), Some("jdoe"));

        let other = sessions.create("jdoe");
        assert_ne!(other.id, session.id);

        assert!(sessions.remove(&session.id).is_some());
        assert!(sessions.get(&session.id).is_none());
        assert!(sessions.get(&other.id).is_some());
    }

    #[test]
    fn test_expired_sessions_are_rejected_and_cleaned() {
        let mut sessions = SessionStore::new(0);
        let session = sessions.create("jdoe");

        assert!(sessions.get(&session.id).is_none());
        assert_eq!(sessions.cleanup_expired(), 1);
        // Nothing left to purge
        assert_eq!(sessions.cleanup_expired(), 0);
    }

    #[test]
    fn test_cookie_helpers() {
        assert_eq!(
            session_cookie("abc", 86400),
            "session_id=abc; HttpOnly; Path=/; SameSite=Lax; Max-Age=86400"
        );
        assert!(clear_session_cookie().contains("Max-Age=0"));

        let mut headers = HeaderMap::new();
        assert_eq!(session_id_from_headers(&headers), None);

        headers.append(header::COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(header::COOKIE, HeaderValue::from_static("lang=en; session_id=xyz123"));
        assert_eq!(session_id_from_headers(&headers).as_deref(), Some("xyz123"));

        let mut empty = HeaderMap::new();
        empty.insert(header::COOKIE, HeaderValue::from_static("session_id="));
        assert_eq!(session_id_from_headers(&empty), None);
    }
}
