use bot_commons::*;
use feedback_bot::config::Config;

fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Bad configuration: {e}");
            std::process::exit(1);
        }
    };

    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "WARN,feedback_bot=info,bot_commons=info");
    }

    let log_file = config.log_file.clone();
    start_everything(Some(&log_file), feedback_bot::entry(config));
}
