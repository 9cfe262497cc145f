//! Partial updates accepted by the store.

/// Changes to apply to a family. `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FamilyUpdate {
    /// New display name.
    pub name: Option<String>,
    /// New join code; must stay unique.
    pub code: Option<String>,
}

impl FamilyUpdate {
    /// An update that changes nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the new name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the new join code.
    #[must_use]
    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// True if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.code.is_none()
    }
}

/// Changes to apply to a user profile. `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfileUpdate {
    /// New display name.
    pub display_name: Option<String>,
    /// New credential hash; must stay unique.
    pub apple_user_id_hash: Option<String>,
    /// New avatar; `Some(None)` clears it.
    pub avatar_url: Option<Option<String>>,
}

impl UserProfileUpdate {
    /// An update that changes nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the new display name.
    #[must_use]
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Sets the new credential hash.
    #[must_use]
    pub fn apple_user_id_hash(mut self, hash: impl Into<String>) -> Self {
        self.apple_user_id_hash = Some(hash.into());
        self
    }

    /// Sets or clears the avatar.
    #[must_use]
    pub fn avatar_url(mut self, url: Option<String>) -> Self {
        self.avatar_url = Some(url);
        self
    }

    /// True if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.apple_user_id_hash.is_none() && self.avatar_url.is_none()
    }
}
