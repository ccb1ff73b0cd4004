mod cards;
mod enrichment;
mod prices;
mod site;

#[cfg(test)]
#[path = "../stages_test.rs"]
mod tests;
