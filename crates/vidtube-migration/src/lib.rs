use sea_orm_migration::prelude::*;

mod m0001_create_users;
mod m0002_create_videos;
mod m0003_create_comments;
mod m0004_create_tweets;
mod m0005_create_likes;
mod m0006_create_subscriptions;
mod m0007_create_playlists;
mod m0008_create_watch_history;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m0001_create_users::Migration),
            Box::new(m0002_create_videos::Migration),
            Box::new(m0003_create_comments::Migration),
            Box::new(m0004_create_tweets::Migration),
            Box::new(m0005_create_likes::Migration),
            Box::new(m0006_create_subscriptions::Migration),
            Box::new(m0007_create_playlists::Migration),
            Box::new(m0008_create_watch_history::Migration),
        ]
    }
}
