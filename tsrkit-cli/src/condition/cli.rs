use clap::{Arg, Command, arg, value_parser};

pub const CONDITION_CMD: &str = "condition";

pub fn create_condition_cli() -> Command {
    Command::new(CONDITION_CMD)
        .about("Group, quantile and order the rows of a TSS or TSR table and print the partitions as JSON.")
        .arg(
            arg!(--table <TABLE>)
                .required(true)
                .help("Tab-separated table with a header row, e.g. the output of `tsrkit cluster`"),
        )
        .arg(
            Arg::new("group-by")
                .long("group-by")
                .required(false)
                .help("Column to group rows by"),
        )
        .arg(
            Arg::new("quantile-by")
                .long("quantile-by")
                .required(false)
                .help("Numeric column to split each group into quantile bins by"),
        )
        .arg(
            arg!(--bins <BINS>)
                .required(false)
                .default_value("5")
                .value_parser(value_parser!(usize))
                .help("Number of quantile bins"),
        )
        .arg(
            arg!(--ascending)
                .action(clap::ArgAction::SetTrue)
                .help("Number quantile bins from the lowest values up"),
        )
        .arg(
            Arg::new("order-by")
                .long("order-by")
                .required(false)
                .help("Column to order rows by within each partition"),
        )
        .arg(
            arg!(--descending)
                .action(clap::ArgAction::SetTrue)
                .help("Order rows from the highest values down"),
        )
        .arg(
            arg!(--output <OUTPUT>)
                .required(false)
                .help("Output JSON path (default: stdout)"),
        )
}
