//! Authentication exchanges for LOGIN and XOAUTH2.
//!
//! LOGIN takes three round trips: the mechanism, then the username and the
//! password as base64 answers to two 334 challenges. XOAUTH2 sends the
//! whole credential as the initial response on the AUTH line. When the
//! token is refused the server may first answer 334 with a JSON error
//! description; the client answers with an empty line to get the final
//! status.

use crate::command::Command;
use crate::error::{Error, Result};
use crate::sasl;
use crate::session::{Session, SessionState};
use crate::transport::Transport;
use crate::types::{AuthMechanism, Reply, ReplyCode};
use tracing::{debug, info, warn};

impl<T: Transport> Session<T> {
    /// Authenticates with `mechanism`.
    ///
    /// `secret` is the password for LOGIN and the bearer token for XOAUTH2.
    /// Neither value is logged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the server refuses the credentials.
    pub async fn authenticate(
        &mut self,
        mechanism: AuthMechanism,
        username: &str,
        secret: &str,
    ) -> Result<()> {
        self.check_transition(SessionState::Authenticated)?;

        match self.server_info().auth_mechanisms() {
            Some(advertised) if !advertised.contains(&mechanism) => {
                warn!(%mechanism, "Server does not advertise this mechanism; trying anyway");
            }
            None => debug!("Server advertised no AUTH extension"),
            Some(_) => {}
        }

        let result = match mechanism {
            AuthMechanism::Login => self.auth_login(username, secret).await,
            AuthMechanism::XOAuth2 => self.auth_xoauth2(username, secret).await,
        };
        if let Err(error) = result {
            self.set_state(SessionState::Failed);
            return Err(error);
        }

        info!(%mechanism, user = username, "Authenticated");
        self.set_state(SessionState::Authenticated);
        Ok(())
    }

    async fn auth_login(&mut self, username: &str, password: &str) -> Result<()> {
        let reply = self
            .command(&Command::Auth {
                mechanism: AuthMechanism::Login,
                initial_response: None,
            })
            .await?;
        expect_challenge(&reply)?;

        let reply = self
            .command(&Command::AuthResponse(sasl::login_response(username)))
            .await?;
        expect_challenge(&reply)?;

        let reply = self
            .command(&Command::AuthResponse(sasl::login_response(password)))
            .await?;
        expect_accepted(&reply)
    }

    async fn auth_xoauth2(&mut self, user: &str, token: &str) -> Result<()> {
        let reply = self
            .command(&Command::Auth {
                mechanism: AuthMechanism::XOAuth2,
                initial_response: Some(sasl::xoauth2_response(user, token)),
            })
            .await?;

        if reply.code != ReplyCode::AUTH_CONTINUE {
            return expect_accepted(&reply);
        }

        let challenge = sasl::decode_challenge(&reply.message_text());
        let details = sasl::parse_oauth_error(&challenge)
            .map_or(challenge, |error| error.to_string());
        debug!(%details, "XOAUTH2 token refused");

        // Empty response completes the exchange; the final reply is an error
        let reply = self
            .command(&Command::AuthResponse(String::new()))
            .await?;
        Err(Error::Auth {
            code: reply.code.as_u16(),
            message: format!("{} ({details})", reply.message_text()),
        })
    }
}

fn expect_challenge(reply: &Reply) -> Result<()> {
    if reply.code == ReplyCode::AUTH_CONTINUE {
        Ok(())
    } else {
        Err(auth_error(reply))
    }
}

fn expect_accepted(reply: &Reply) -> Result<()> {
    if reply.code == ReplyCode::AUTH_SUCCESS {
        Ok(())
    } else {
        Err(auth_error(reply))
    }
}

fn auth_error(reply: &Reply) -> Error {
    Error::Auth {
        code: reply.code.as_u16(),
        message: reply.message_text(),
    }
}
