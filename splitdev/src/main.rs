mod application;
mod presentation {
    pub mod cli;
}

#[tokio::main]
async fn main() -> split_core::error::Result<()> {
    application::run().await
}
