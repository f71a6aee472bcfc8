use clap::Parser;

/// This program rebuilds the routes of field employees from their punch-in and visit records.
#[derive(Parser, Debug, Clone, Default)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON configuration file. It may describe the input, the date convention,
    /// extra column keywords, the colours of the routes and default filters. See the manual for the format.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) A reference file containing the expected output in JSON format. If provided, fieldroutes will
    /// check that the generated output matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the output will be written in JSON format to the given
    /// location. By default, it is printed on the standard output.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) The table of punch-in and visit records. Setting this option overrides the path that may be
    /// specified with the --config option.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (csv or excel) The type of the input. By default, it is guessed from the extension of the file.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// (default: the first worksheet) When using an Excel file, indicates the name of the worksheet to use.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// (day_first, month_first, year_first or a chrono format) How to read ambiguous dates such as 03-04-2024.
    #[clap(long, value_parser)]
    pub date_format: Option<String>,

    /// (YYYY-MM-DD) Only keep the records punched on or after this day.
    #[clap(long, value_parser)]
    pub start_date: Option<String>,

    /// (YYYY-MM-DD) Only keep the records punched on or before this day.
    #[clap(long, value_parser)]
    pub end_date: Option<String>,

    /// Only keep the records of this employee (exact name).
    #[clap(long, value_parser)]
    pub employee: Option<String>,

    /// Prints the names of the employees instead of the routes.
    #[clap(long, takes_value = false)]
    pub list_employees: bool,

    /// Prints the days with at least one valid punch-in instead of the routes.
    #[clap(long, takes_value = false)]
    pub list_dates: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
