pub mod review_record;
