use error_stack::ResultExt;

use crate::auth::Session;
use crate::http::Result;
use crate::model::UserError;
use crate::types::form::{AuthToken, Credentials};
use crate::App;

/// Creates an account and logs it in right away.
#[tracing::instrument(skip_all, fields(username = %credentials.username), name = "services.users.register")]
pub async fn register(app: &App, credentials: &Credentials) -> Result<AuthToken> {
    credentials
        .validate()
        .change_context(UserError::Validation)?;

    let user = app.users.register(credentials).await?;
    let session = app.sessions.create(&user).await?;
    tracing::info!(user.id = %user.id, "registered user");

    Ok(AuthToken {
        token: session.token,
    })
}

#[tracing::instrument(skip_all, fields(username = %credentials.username), name = "services.users.login")]
pub async fn login(app: &App, credentials: &Credentials) -> Result<AuthToken> {
    credentials
        .validate()
        .change_context(UserError::Validation)?;

    let user = app.users.authorize(credentials).await?;
    let session = app.sessions.create(&user).await?;

    Ok(AuthToken {
        token: session.token,
    })
}

/// Revokes the session server-side. Logging out twice is not an error.
#[tracing::instrument(skip_all, fields(user.id = %session.user.id), name = "services.users.logout")]
pub async fn logout(app: &App, session: &Session) -> Result<()> {
    let revoked = app.sessions.revoke(session.token.as_str()).await?;
    if !revoked {
        tracing::debug!("session was already revoked");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types;

    #[tokio::test]
    async fn register_then_login() {
        let app = App::for_tests();

        let registered = register(&app, &Credentials::new("alice", "wonderland"))
            .await
            .unwrap();
        let session = app.sessions.check(registered.token.as_str()).await.unwrap();
        assert_eq!(session.user.username, "alice");

        let logged_in = login(&app, &Credentials::new("alice", "wonderland"))
            .await
            .unwrap();
        assert_ne!(logged_in.token, registered.token);

        let session = app.sessions.check(logged_in.token.as_str()).await.unwrap();
        assert_eq!(session.user.username, "alice");
    }

    #[tokio::test]
    async fn rejects_duplicate_usernames() {
        let app = App::for_tests();
        register(&app, &Credentials::new("alice", "wonderland"))
            .await
            .unwrap();

        let error = register(&app, &Credentials::new("alice", "looking-glass"))
            .await
            .unwrap_err();
        assert_eq!(error.as_type(), &types::Error::AlreadyExists);
    }

    #[tokio::test]
    async fn rejects_invalid_forms() {
        let app = App::for_tests();
        let error = register(&app, &Credentials::new("a b", "short"))
            .await
            .unwrap_err();

        assert_eq!(
            error.as_type(),
            &types::Error::InvalidFormBody {
                errors: vec![
                    "password: Passwords must not be too short".into(),
                    "username: Invalid username".into(),
                ]
            }
        );
    }

    #[tokio::test]
    async fn unknown_users_and_wrong_passwords_differ() {
        let app = App::for_tests();
        register(&app, &Credentials::new("alice", "wonderland"))
            .await
            .unwrap();

        let wrong_password = login(&app, &Credentials::new("alice", "looking-glass"))
            .await
            .unwrap_err();
        let unknown_user = login(&app, &Credentials::new("ghost", "wonderland"))
            .await
            .unwrap_err();

        assert_eq!(wrong_password.as_type(), &types::Error::InvalidCredentials);
        assert_eq!(unknown_user.as_type(), &types::Error::NotFound);
    }

    #[tokio::test]
    async fn logout_revokes_the_token() {
        let app = App::for_tests();
        let token = register(&app, &Credentials::new("alice", "wonderland"))
            .await
            .unwrap()
            .token;

        let session = app.sessions.check(token.as_str()).await.unwrap();
        logout(&app, &session).await.unwrap();
        logout(&app, &session).await.unwrap();

        let report = app.sessions.check(token.as_str()).await.unwrap_err();
        assert_eq!(
            report.current_context(),
            &crate::auth::SessionError::Unauthenticated
        );
    }
}
