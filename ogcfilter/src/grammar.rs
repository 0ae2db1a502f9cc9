use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "time.pest"]
pub struct TimeParser;
