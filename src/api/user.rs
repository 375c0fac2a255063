use crate::api::client::SpotifyClient;
use crate::api::models::UserProfile;
use crate::error::AppResult;

impl SpotifyClient {
    /// Id of the signed-in user, `None` if the profile omits it.
    pub async fn current_user_id(&self) -> AppResult<Option<String>> {
        let response = self.get("/me").await?;
        let profile: UserProfile = response.json().await?;
        Ok(profile.id)
    }
}
