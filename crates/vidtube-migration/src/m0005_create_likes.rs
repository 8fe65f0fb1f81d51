use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Likes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Likes::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Likes::LikedBy).uuid().not_null())
                    .col(ColumnDef::new(Likes::VideoId).uuid().null())
                    .col(ColumnDef::new(Likes::CommentId).uuid().null())
                    .col(ColumnDef::new(Likes::TweetId).uuid().null())
                    .col(
                        ColumnDef::new(Likes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_likes_liked_by")
                            .from(Likes::Table, Likes::LikedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_likes_video")
                            .from(Likes::Table, Likes::VideoId)
                            .to(Videos::Table, Videos::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_likes_comment")
                            .from(Likes::Table, Likes::CommentId)
                            .to(Comments::Table, Comments::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_likes_tweet")
                            .from(Likes::Table, Likes::TweetId)
                            .to(Tweets::Table, Tweets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // NULL targets never collide, so one unique index per target kind is enough.
        for (name, target) in [
            ("uq_likes_user_video", Likes::VideoId),
            ("uq_likes_user_comment", Likes::CommentId),
            ("uq_likes_user_tweet", Likes::TweetId),
        ] {
            manager
                .create_index(
                    Index::create()
                        .name(name)
                        .table(Likes::Table)
                        .col(Likes::LikedBy)
                        .col(target)
                        .unique()
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for name in ["uq_likes_user_video", "uq_likes_user_comment", "uq_likes_user_tweet"] {
            manager
                .drop_index(Index::drop().name(name).table(Likes::Table).to_owned())
                .await?;
        }

        manager
            .drop_table(Table::drop().table(Likes::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Videos {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Comments {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Tweets {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Likes {
    Table,
    Id,
    LikedBy,
    VideoId,
    CommentId,
    TweetId,
    CreatedAt,
}
