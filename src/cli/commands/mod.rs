use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ArgAction, ColorChoice, Command,
};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("bileto")
        .about("Ticket-based single sign-on authority")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("BILETO_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("tgt-lifetime")
                .long("tgt-lifetime")
                .help("Absolute granting-ticket lifetime in seconds")
                .default_value("28800")
                .env("BILETO_TGT_LIFETIME")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("tgt-idle-timeout")
                .long("tgt-idle-timeout")
                .help("Sliding granting-ticket idle timeout in seconds")
                .default_value("7200")
                .env("BILETO_TGT_IDLE_TIMEOUT")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("st-lifetime")
                .long("st-lifetime")
                .help("Service-ticket lifetime in seconds")
                .default_value("10")
                .env("BILETO_ST_LIFETIME")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("sweep-interval")
                .long("sweep-interval")
                .help("Seconds between eviction sweeps")
                .default_value("60")
                .env("BILETO_SWEEP_INTERVAL")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("service")
                .short('s')
                .long("service")
                .help("Registered service URL (exact match), repeatable")
                .env("BILETO_SERVICE")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("users-file")
                .long("users-file")
                .help("Local account table, one account:password per line")
                .env("BILETO_USERS_FILE"),
        )
        .arg(
            Arg::new("directory-url")
                .long("directory-url")
                .help("Directory endpoint for bind authentication, example: ldaps://ds.example.org")
                .env("BILETO_DIRECTORY_URL"),
        )
        .arg(
            Arg::new("directory-bind-template")
                .long("directory-bind-template")
                .help("Bind DN template containing {user}, example: uid={user},ou=people,dc=example,dc=org")
                .env("BILETO_DIRECTORY_BIND_TEMPLATE"),
        )
        .arg(
            Arg::new("directory-timeout")
                .long("directory-timeout")
                .help("Directory bind timeout in seconds")
                .default_value("5")
                .env("BILETO_DIRECTORY_TIMEOUT")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("otp-verify-url")
                .long("otp-verify-url")
                .help("One-time-password cloud verification endpoint")
                .env("BILETO_OTP_VERIFY_URL"),
        )
        .arg(
            Arg::new("otp-client-id")
                .long("otp-client-id")
                .help("Client id for the OTP verification endpoint")
                .env("BILETO_OTP_CLIENT_ID"),
        )
        .arg(
            Arg::new("otp-accounts-file")
                .long("otp-accounts-file")
                .help("Device account registry, one account:public_id per line")
                .env("BILETO_OTP_ACCOUNTS_FILE"),
        )
        .arg(
            Arg::new("delegation-validate-url")
                .long("delegation-validate-url")
                .help("Remote endpoint validating externally issued assertions")
                .env("BILETO_DELEGATION_VALIDATE_URL"),
        )
        .arg(
            Arg::new("remote-timeout")
                .long("remote-timeout")
                .help("Timeout in seconds for OTP and delegation remote calls")
                .default_value("5")
                .env("BILETO_REMOTE_TIMEOUT")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("BILETO_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}
