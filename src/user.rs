//! User registry keyed by alias.
use super::error::RideError;

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct User {
    #[n(0)]
    pub alias: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub car_plate: Option<String>,
}

impl User {
    pub fn new(alias: impl Into<String>, name: impl Into<String>, car_plate: Option<String>) -> Self {
        Self {
            alias: alias.into(),
            name: name.into(),
            car_plate,
        }
    }
}

/// Registered users in insertion order. Aliases are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
#[cbor(transparent)]
pub struct UserRegistry(#[n(0)] Vec<User>);

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, user: User) -> Result<(), RideError> {
        if self.contains(&user.alias) {
            return Err(RideError::AliasTaken(user.alias));
        }
        self.0.push(user);
        Ok(())
    }

    pub fn lookup(&self, alias: &str) -> Option<&User> {
        self.0.iter().find(|u| u.alias == alias)
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.lookup(alias).is_some()
    }

    pub fn users(&self) -> &[User] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
