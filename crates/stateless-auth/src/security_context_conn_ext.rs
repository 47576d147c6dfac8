use crate::SecurityContext;
use trillium::Conn;

/**
Extension trait adding security-context accessors to [`Conn`].

[`SecurityContextHandler`](crate::SecurityContextHandler) **must** run
on the conn before any of these functions are called.

`P` is your application's principal type; it has to match the
[`PrincipalSerializer`](crate::PrincipalSerializer) the handler was
built with.
*/
pub trait SecurityContextConnExt {
    /// Retrieves a reference to the current security context.
    fn security_context<P: Send + Sync + 'static>(&self) -> &SecurityContext<P>;

    /// Retrieves a mutable reference to the current security context,
    /// for login (`set_authentication`) and logout (`clear`).
    fn security_context_mut<P: Send + Sync + 'static>(&mut self) -> &mut SecurityContext<P>;

    /// The authenticated principal for this request, if any.
    fn principal<P: Send + Sync + 'static>(&self) -> Option<&P>;

    /// Authenticates this request's browser as `principal`, returning
    /// the conn for fluent chaining. The authentication cookie is
    /// issued when the response is sent.
    fn with_principal<P: Send + Sync + 'static>(self, principal: P) -> Self;
}

impl SecurityContextConnExt for Conn {
    fn security_context<P: Send + Sync + 'static>(&self) -> &SecurityContext<P> {
        self.state().expect(
            "SecurityContextHandler must be executed before calling \
             SecurityContextConnExt::security_context",
        )
    }

    fn security_context_mut<P: Send + Sync + 'static>(&mut self) -> &mut SecurityContext<P> {
        self.state_mut().expect(
            "SecurityContextHandler must be executed before calling \
             SecurityContextConnExt::security_context_mut",
        )
    }

    fn principal<P: Send + Sync + 'static>(&self) -> Option<&P> {
        self.security_context::<P>().authentication()
    }

    fn with_principal<P: Send + Sync + 'static>(mut self, principal: P) -> Self {
        self.security_context_mut::<P>().set_authentication(principal);
        self
    }
}
