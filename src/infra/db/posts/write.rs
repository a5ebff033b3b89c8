use async_trait::async_trait;

use crate::{
    application::repos::{CreatePostParams, PostsWriteRepo, RepoError, UpdatePostParams},
    domain::entities::PostRecord,
    infra::db::{PostgresRepositories, map_sqlx_error},
};

use super::{POST_JOINS, POST_PROJECTION, types::PostRow};

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let sql = format!(
            "WITH p AS ( \
                INSERT INTO posts (author_id, text, group_id, image) \
                VALUES ($1, $2, $3, $4) \
                RETURNING id, text, author_id, group_id, image, created_at \
             ) \
             SELECT {POST_PROJECTION} FROM p{POST_JOINS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(params.author_id)
            .bind(&params.text)
            .bind(params.group_id)
            .bind(params.image.as_deref())
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let sql = format!(
            "WITH p AS ( \
                UPDATE posts SET text = $2, group_id = $3, image = $4 \
                WHERE id = $1 \
                RETURNING id, text, author_id, group_id, image, created_at \
             ) \
             SELECT {POST_PROJECTION} FROM p{POST_JOINS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(params.id)
            .bind(&params.text)
            .bind(params.group_id)
            .bind(params.image.as_deref())
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(PostRecord::from).ok_or(RepoError::NotFound)
    }
}
